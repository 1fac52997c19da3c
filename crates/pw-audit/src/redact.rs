// redact.rs — Redaction of sensitive values before hashing.
//
// Audit records never store raw secrets or large payloads. Before args and
// results are hashed, fields with secret-bearing names and oversized string
// values are replaced by `sha256:<hex>` markers. The marker is itself a
// deterministic function of the value, so replay comparisons still work —
// the value just isn't retained anywhere.

use serde_json::Value;

use crate::hasher;

/// String values longer than this are replaced by their hash marker.
const REDACT_SIZE_THRESHOLD: usize = 4096;

/// Keys whose values are always redacted, regardless of size.
/// Matched case-insensitively as substrings of the key name.
const SECRET_KEY_TOKENS: &[&str] = &["secret", "token", "password", "signature", "credential"];

/// Redact a JSON value in place, returning the redacted form.
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| {
                    if is_secret_key(&key) {
                        (key, marker(&val))
                    } else {
                        (key, redact(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        Value::String(s) if s.len() > REDACT_SIZE_THRESHOLD => marker(&Value::String(s)),
        other => other,
    }
}

fn is_secret_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SECRET_KEY_TOKENS.iter().any(|token| lower.contains(token))
}

fn marker(value: &Value) -> Value {
    Value::String(format!("sha256:{}", hasher::hash_canonical(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secret_keys_are_redacted() {
        let redacted = redact(json!({"bootstrap_secret": "hunter2", "path": "a.txt"}));
        let secret = redacted["bootstrap_secret"].as_str().unwrap();
        assert!(secret.starts_with("sha256:"));
        assert_eq!(redacted["path"], "a.txt");
    }

    #[test]
    fn signature_fields_are_redacted() {
        let redacted = redact(json!({"signature": "deadbeef"}));
        assert!(redacted["signature"].as_str().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn oversized_strings_are_redacted() {
        let big = "x".repeat(REDACT_SIZE_THRESHOLD + 1);
        let redacted = redact(json!({"content": big}));
        assert!(redacted["content"].as_str().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn small_values_pass_through() {
        let original = json!({"content": "short", "count": 3, "nested": {"ok": true}});
        assert_eq!(redact(original.clone()), original);
    }

    #[test]
    fn redaction_is_deterministic() {
        let value = json!({"token": "abc123"});
        assert_eq!(redact(value.clone()), redact(value));
    }

    #[test]
    fn nested_secrets_are_found() {
        let redacted = redact(json!({"outer": {"api_token": "xyz"}}));
        assert!(redacted["outer"]["api_token"]
            .as_str()
            .unwrap()
            .starts_with("sha256:"));
    }
}
