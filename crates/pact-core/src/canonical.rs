//! Canonical JSON: lexicographically sorted keys, UTF-8, no insignificant
//! whitespace. Every signed or hashed payload is serialized this way so two
//! implementations produce byte-identical messages regardless of field
//! declaration order.

use serde::Serialize;
use serde_json::Value;

use crate::error::PactError;

/// Serialize `value` to its canonical JSON string.
///
/// Routing through [`serde_json::Value`] sorts object keys: the default
/// `serde_json::Map` is BTreeMap-backed, so nested objects come out in key
/// order, and `to_string` emits compact separators.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, PactError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Serialize `value` to a [`Value`] (key-sorted maps, ready for hashing or
/// embedding in a transaction payload).
pub fn canonical_value<T: Serialize>(value: &T) -> Result<Value, PactError> {
    Ok(serde_json::to_value(value)?)
}
