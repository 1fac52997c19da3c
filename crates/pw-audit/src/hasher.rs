// hasher.rs — SHA-256 hashing and canonical JSON serialization.
//
// All hashes in Planward are SHA-256, hex-encoded lowercase. The audit
// chain additionally needs a canonical serialization: the UTF-8 bytes of
// the JSON value with object keys sorted lexicographically and no
// insignificant whitespace. Canonicalization is done explicitly here
// rather than relying on serde_json's map ordering, so the result is
// stable no matter which map backend feature-unification picks.

use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::AuditError;

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash the contents of a file on disk.
pub fn hash_file(path: &Path) -> Result<String, AuditError> {
    let data = std::fs::read(path).map_err(|source| AuditError::HashFileFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&data))
}

/// Serialize a JSON value canonically: keys sorted, no extra whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Hash the canonical serialization of a JSON value.
pub fn hash_canonical(value: &Value) -> String {
    hash_str(&canonical_json(value))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json::to_string on a str cannot fail.
                out.push_str(&serde_json::to_string(key).expect("string serialization"));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single compact form.
        other => out.push_str(&serde_json::to_string(other).expect("scalar serialization")),
    }
}
