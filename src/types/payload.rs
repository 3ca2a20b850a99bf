//! The `{data, meta}` payload handed to controllers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A successful search result, exactly as cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPayload {
    pub data: Vec<Value>,
    #[serde(default = "empty_object")]
    pub meta: Value,
    /// Lookup tables some endpoints return next to `data` (carriers, aircraft, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionaries: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for SearchPayload {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            meta: empty_object(),
            dictionaries: None,
        }
    }
}

impl SearchPayload {
    /// Normalise an upstream body into the consumer shape.
    ///
    /// `data` becomes an array (a single object is wrapped, a missing or null
    /// field becomes empty) and a missing `meta` becomes `{}`.
    pub fn from_upstream(body: Value) -> Self {
        let mut fields = match body {
            Value::Object(fields) => fields,
            Value::Array(items) => {
                return Self {
                    data: items,
                    ..Self::default()
                }
            }
            Value::Null => return Self::default(),
            other => {
                return Self {
                    data: vec![other],
                    ..Self::default()
                }
            }
        };

        let data = match fields.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };
        let meta = match fields.remove("meta") {
            Some(meta @ Value::Object(_)) => meta,
            _ => empty_object(),
        };
        let dictionaries = fields.remove("dictionaries").filter(|d| !d.is_null());

        Self {
            data,
            meta,
            dictionaries,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
