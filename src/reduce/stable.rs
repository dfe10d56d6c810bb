//! Deterministic JSON encoding.
//!
//! `serde_json`'s default map is ordered by key, so any value routed through
//! `Value` serializes with lexicographic object keys. These helpers make that
//! guarantee explicit at the call sites that rely on it (byte accounting in
//! the reducer, response framing in the RPC layer).

use serde::Serialize;
use serde_json::Value;

/// Sentinel for values that cannot be encoded.
pub const UNSERIALIZABLE: &str = "\"[Unserializable]\"";

/// Compact JSON with lexicographically sorted object keys.
pub fn to_stable_string(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| UNSERIALIZABLE.to_string())
}

/// Serialize any value through `Value` so object keys come out sorted.
pub fn serialize_stable<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(to_stable_string(&value))
}

/// UTF-8 byte length of the stable encoding.
pub fn stable_byte_len(value: &Value) -> u64 {
    to_stable_string(value).len() as u64
}
