//! Cache key derivation.
//!
//! Storage keys are `sanitize_key(prefix + group + "_" + key)`. Underscores
//! inside the group name are stored as `-`, so one group's prefix never
//! matches another group. Structured payloads are reduced to a stable digest
//! first so callers can key on arbitrary arguments.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::util::text::sanitize_key;

/// Full key as written to the backend.
pub fn storage_key(prefix: &str, group: &str, key: &str) -> String {
    format!("{}{}", group_prefix(prefix, group), sanitize_key(key))
}

/// Prefix shared by every entry of `group`.
pub fn group_prefix(prefix: &str, group: &str) -> String {
    format!("{}{}_", sanitize_key(prefix), group_segment(group))
}

/// Prefix shared by every entry written under `prefix`.
pub fn namespace_prefix(prefix: &str) -> String {
    sanitize_key(prefix)
}

fn group_segment(group: &str) -> String {
    sanitize_key(group).replace('_', "-")
}

/// Deterministic key for a structured payload within `group`.
///
/// String payloads are hashed verbatim; anything else is JSON-encoded first.
/// Payloads that cannot be encoded hash as an empty document.
pub fn build_key<T: Serialize + ?Sized>(payload: &T, group: &str) -> String {
    let encoded = match serde_json::to_value(payload) {
        Ok(Value::String(text)) => text,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    };

    let mut hasher = Sha256::new();
    hasher.update(group.as_bytes());
    hasher.update([0u8]);
    hasher.update(encoded.as_bytes());
    hex::encode(hasher.finalize())
}
