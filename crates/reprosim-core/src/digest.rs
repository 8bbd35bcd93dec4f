//! Canonical JSON and SHA-256 digests of sweep configurations.
//!
//! Object keys are sorted by UTF-16 code units and the result is written
//! compactly. Numbers are left exactly as written: `1` and `1.0` are different
//! span candidates and must hash differently.

use serde_json::Value;
use sha2::{Digest, Sha256};

fn sort_keys_utf16(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys_utf16(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys_utf16).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with recursively sorted keys.
pub fn canonical_json(value: &Value) -> String {
    sort_keys_utf16(value).to_string()
}

/// SHA-256 hex digest of [`canonical_json`].
pub fn compute_digest(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}
