use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::clock::{add_duration, remaining};

/// A bearer credential and the instant it stops being accepted.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use chrono::Utc;
/// use tripgate::auth::Credential;
///
/// let now = Utc::now();
/// let credential = Credential::from_expires_in("abc", Duration::from_secs(1799), now);
/// assert!(credential.is_fresh(now, Duration::from_secs(300)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Credential issued at `now` that lives for `expires_in`.
    pub fn from_expires_in(
        token: impl Into<String>,
        expires_in: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(token, add_duration(now, expires_in))
    }

    /// True while more than `buffer` remains before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        add_duration(now, buffer) < self.expires_at
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        remaining(now, self.expires_at)
    }

    pub fn expires_at_epoch_ms(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}
