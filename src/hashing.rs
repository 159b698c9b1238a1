//! Hashing - SHA-256 for Reproducibility
//!
//! Frame hashes are taken over the PNG bytes as written to disk.
//!
//! `configHash` is taken over the run configuration re-serialized with object
//! keys in sorted order. Struct field order and the key order of the JSON file
//! it was loaded from therefore never change the hash; only values do. Two
//! reports with the same `configHash` and engine version were produced from
//! the same settings.

use sha2::{Digest, Sha256};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Serialize with object keys sorted at every depth and no whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    serde_json::to_string(&sort_value(v))
}

fn sort_value(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// config_hash = sha256(engine_version + ":" + canonical_config)
pub fn compute_config_hash(config: &impl Serialize, engine_version: &str) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(config)?;
    Ok(sha256_hex(format!("{}:{}", engine_version, canonical).as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
