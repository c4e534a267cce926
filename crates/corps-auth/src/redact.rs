//! Scrubbing of sensitive values before they reach a log line.

use serde_json::Value;

/// Field-name fragments whose values are never logged.
const SENSITIVE_FIELDS: &[&str] = &["password", "token", "key", "secret", "auth"];

const REDACTED: &str = "[REDACTED]";

/// Copy of `value` with every sensitive field replaced by `[REDACTED]`.
///
/// Objects are walked recursively; a field is sensitive when its lowercase
/// name contains one of the known fragments.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(name, inner)| {
                    let lower = name.to_ascii_lowercase();
                    if SENSITIVE_FIELDS.iter().any(|field| lower.contains(field)) {
                        (name.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (name.clone(), redact(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Mask the local part of an email address: `petrov@nkkk.ru` → `p***@nkkk.ru`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}
