//! Upstream inventory domains.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// An inventory domain of the upstream API.
///
/// Domains partition the durable cache and carry their own default lifetime,
/// because the volatility of upstream data differs between them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Domain {
    Flight,
    Hotel,
    Location,
    Activity,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Hotel => "hotel",
            Self::Location => "location",
            Self::Activity => "activity",
        }
    }

    /// Parameters whose string values the upstream treats case-insensitively.
    ///
    /// Names are in normalised form: lowercase with `_` and `-` removed.
    pub fn case_insensitive_params(&self) -> &'static [&'static str] {
        match self {
            Self::Flight => &[
                "originlocationcode",
                "destinationlocationcode",
                "currencycode",
            ],
            Self::Hotel => &["hotelids", "citycode", "currency"],
            Self::Location => &["keyword", "countrycode", "subtype"],
            Self::Activity => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn parses_and_displays_lowercase_names() {
        for domain in Domain::iter() {
            assert_eq!(domain.to_string(), domain.as_str());
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert_eq!("Location".parse::<Domain>().unwrap(), Domain::Location);
        assert!("cruise".parse::<Domain>().is_err());
    }
}
