//! Cache key codec.
//!
//! Turns a domain plus an arbitrary parameter set into a stable string. Keys
//! are independent of parameter order and of the casing convention used for
//! parameter names, and free-text / code parameters the domain declares
//! case-insensitive are folded before encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::types::Domain;

/// Deterministic cache key for one logical upstream lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Encode `params` for `domain`. Pure and total.
    ///
    /// # Example
    /// ```
    /// use serde_json::json;
    /// use tripgate::cache::CacheKey;
    /// use tripgate::types::Domain;
    ///
    /// let a = CacheKey::encode(Domain::Activity, &json!({"b": 2, "a": 1}));
    /// let b = CacheKey::encode(Domain::Activity, &json!({"a": 1, "b": 2}));
    /// assert_eq!(a, b);
    /// ```
    pub fn encode(domain: Domain, params: &Value) -> Self {
        let canonical = canonicalize(params, domain.case_insensitive_params(), false);
        Self(format!("{}:{}", domain.as_str(), canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 of the key as lowercase hex, safe to use as a file or row name.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `subType`, `sub_type` and `SUB-TYPE` all become `subtype`.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn normalize_text(text: &str, fold_case: bool) -> String {
    if fold_case {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    } else {
        text.trim().to_string()
    }
}

fn canonicalize(value: &Value, insensitive: &[&str], fold_case: bool) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(name, v)| {
                    let name = normalize_name(name);
                    let fold = insensitive.contains(&name.as_str());
                    let v = canonicalize(v, insensitive, fold);
                    (name, v)
                })
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            // Inserted in sorted order so the output is canonical whether or
            // not serde_json preserves insertion order.
            let mut canonical = Map::new();
            for (name, v) in entries {
                canonical.insert(name, v);
            }
            Value::Object(canonical)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| canonicalize(item, insensitive, fold_case))
                .collect(),
        ),
        Value::String(text) => Value::String(normalize_text(text, fold_case)),
        other => other.clone(),
    }
}
