//! Deterministic content keys.
//!
//! A key is the first 16 hex characters of the SHA-256 digest of a value's
//! canonical JSON encoding: compact, with object keys sorted at every depth.
//! Arrays keep their order, so callers that want order independence must
//! normalize first (see [`unordered_pair_key`]).

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const KEY_HEX_LEN: usize = 16;

/// Compact JSON with object keys sorted lexicographically.
///
/// ```
/// use serde_json::json;
/// use ddifuse_core::hash::canonical_json;
///
/// assert_eq!(canonical_json(&json!({"z": 1, "a": {"c": 3, "b": 2}})), r#"{"a":{"b":2,"c":3},"z":1}"#);
/// ```
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut buf = String::new();
    write_canonical(value, &mut buf);
    buf
}

fn write_canonical(value: &Value, buf: &mut String) {
    match value {
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            buf.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(&Value::String(key.clone()).to_string());
                buf.push(':');
                write_canonical(val, buf);
            }
            buf.push('}');
        }
        scalar => buf.push_str(&scalar.to_string()),
    }
}

/// Full lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 16-hex content key for `value`.
#[must_use]
pub fn content_key(value: &Value) -> String {
    let mut digest = sha256_hex(canonical_json(value).as_bytes());
    digest.truncate(KEY_HEX_LEN);
    digest
}

/// `"{min}|{max}"` over the lowercased names, so `(A, B)` and `(B, A)` agree.
#[must_use]
pub fn unordered_pair_key(a: &str, b: &str) -> String {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}
