//! Domain search services: typed queries in, cached `{data, meta}` out.

pub mod query;
pub mod service;

pub use query::{
    ActivitySearch, FlightSearch, HotelSearch, LocationSearch, LocationSubType, RawQuery,
    SearchQuery, TravelClass,
};
pub use service::SearchService;

use reqwest::Method;
use serde_json::{json, Value};

use crate::cache::CacheKey;
use crate::error::{GatewayError, Result};
use crate::types::Domain;

/// Flatten a parameter object into query-string pairs.
///
/// Nulls are skipped and arrays are comma-joined (`subType=CITY,AIRPORT`).
pub fn to_query(params: &Value) -> Result<Vec<(String, String)>> {
    let fields = match params {
        Value::Object(fields) => fields,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(GatewayError::InvalidArgument(format!(
                "query parameters must be an object, got {other}"
            )))
        }
    };

    let mut pairs = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let rendered = match value {
            Value::Null => continue,
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
            other => scalar_text(other),
        };
        pairs.push((name.clone(), rendered));
    }
    Ok(pairs)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Cache key for one request: endpoint, method, parameters and body.
pub fn request_key(
    domain: Domain,
    method: &Method,
    path: &str,
    params: &Value,
    body: Option<&Value>,
) -> CacheKey {
    CacheKey::encode(
        domain,
        &json!({
            "method": method.as_str(),
            "endpoint": path,
            "params": params,
            "body": body,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lists_are_comma_joined_and_nulls_skipped() {
        let pairs = to_query(&json!({
            "keyword": "Paris",
            "subType": ["CITY", "AIRPORT"],
            "page[limit]": 5,
            "countryCode": null,
        }))
        .unwrap();

        let mut pairs = pairs;
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("keyword".to_string(), "Paris".to_string()),
                ("page[limit]".to_string(), "5".to_string()),
                ("subType".to_string(), "CITY,AIRPORT".to_string()),
            ]
        );
    }

    #[test]
    fn non_object_params_are_rejected() {
        assert!(to_query(&json!("oops")).is_err());
        assert!(to_query(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn request_keys_cover_the_endpoint() {
        let params = json!({"keyword": "PAR"});
        let cities = request_key(
            Domain::Location,
            &Method::GET,
            "/v1/reference-data/locations/cities",
            &params,
            None,
        );
        let locations = request_key(
            Domain::Location,
            &Method::GET,
            "/v1/reference-data/locations",
            &params,
            None,
        );
        assert_ne!(cities, locations);
        assert_eq!(
            locations,
            request_key(
                Domain::Location,
                &Method::GET,
                "/v1/reference-data/locations",
                &json!({"keyword": "par"}),
                None,
            )
        );
    }
}
