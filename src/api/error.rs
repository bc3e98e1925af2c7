//! Server error bodies.
//!
//! The backend answers failures with DRF-shaped JSON: `{"detail": "..."}`,
//! `{"error": "..."}`, `{"non_field_errors": [...]}` or a map of field name
//! to message list. This picks the one message worth showing the user.

use serde_json::Value;

/// Keys that hold a whole-request message, in priority order.
const MESSAGE_KEYS: &[&str] = &["detail", "error", "message", "non_field_errors"];

/// Extract a human-readable message from an error response body.
pub fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    match &value {
        Value::String(s) => non_empty(s),
        Value::Array(items) => items.iter().find_map(first_text),
        Value::Object(map) => {
            for key in MESSAGE_KEYS {
                if let Some(text) = map.get(*key).and_then(first_text) {
                    return Some(text);
                }
            }
            // Field errors: report the first field with its message.
            map.iter()
                .find_map(|(field, v)| first_text(v).map(|msg| format!("{field}: {msg}")))
        }
        _ => None,
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Array(items) => items.iter().find_map(first_text),
        Value::Object(map) => map.get("message").and_then(first_text),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
