//! Content fingerprints
//!
//! A fingerprint is the first 12 hex characters of the SHA-256 of a
//! canonical JSON form of a value: map keys sorted, excluded keys dropped at
//! every depth, tags kept as `{"__tag__", "__value__"}` pairs.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use serde_yaml::Value;
use sha2::{Digest, Sha256};

use crate::yaml::scalar_string;

const FINGERPRINT_LEN: usize = 12;

/// Canonical JSON form of a YAML value.
pub fn normalize(value: &Value, exclude: &[&str]) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                JsonValue::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or_else(|| JsonValue::String(n.to_string()))
            }
        }
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Sequence(items) => {
            JsonValue::Array(items.iter().map(|item| normalize(item, exclude)).collect())
        }
        Value::Mapping(map) => {
            let sorted: BTreeMap<String, JsonValue> = map
                .iter()
                .map(|(key, value)| (scalar_string(key), value))
                .filter(|(key, _)| !exclude.contains(&key.as_str()))
                .map(|(key, value)| (key, normalize(value, exclude)))
                .collect();
            JsonValue::Object(sorted.into_iter().collect())
        }
        Value::Tagged(tagged) => {
            let mut object = serde_json::Map::new();
            object.insert(
                "__tag__".to_string(),
                JsonValue::String(tagged.tag.to_string()),
            );
            object.insert("__value__".to_string(), normalize(&tagged.value, exclude));
            JsonValue::Object(object)
        }
    }
}

/// Fingerprint of a value. `None` (content that could not be expanded)
/// fingerprints like `null`.
pub fn fingerprint(value: Option<&Value>, exclude: &[&str]) -> String {
    let normalized = value.map_or(JsonValue::Null, |v| normalize(v, exclude));
    let payload = normalized.to_string();
    let digest = Sha256::digest(payload.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..FINGERPRINT_LEN].to_string()
}
