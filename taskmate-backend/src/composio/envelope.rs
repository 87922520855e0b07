//! Helpers for digging payloads out of Composio tool results.
//!
//! Tool results arrive in several shapes depending on the toolkit version:
//! the interesting array may sit under `data`, `data.items`,
//! `data.response_data`, or be the root value itself. Each extractor takes an
//! ordered list of dotted candidate paths (the empty path is the root) and
//! returns the first one that actually holds an array.

use serde_json::Value;

pub const CALENDAR_ITEMS: &[&str] = &["data.items", "items", "", "data"];
pub const CANVAS_COURSES: &[&str] = &["data.response_data", "data", "", "data.data", "data.courses"];
pub const CANVAS_ASSIGNMENTS: &[&str] = &["data.response_data", "data", "data.data", ""];
pub const GMAIL_MESSAGES: &[&str] = &["data.messages", "messages", "", "data"];

/// Follow a dotted path. The empty path returns `value`.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// First candidate path that holds an array, cloned; empty when none does
pub fn extract_array(value: &Value, candidates: &[&str]) -> Vec<Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// A tool-level error reported inside an otherwise successful response
pub fn envelope_error(value: &Value) -> Option<String> {
    ["error", "data.error"]
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| is_present(v))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

/// Render an id that may be a JSON string or number
pub fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First key of `value` holding a usable id
pub fn first_id(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| value.get(k)).find_map(json_id)
}

/// First non-empty string found at any of the dotted `paths`
pub fn first_str(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// The message object inside a get-message result: `data`, then `payload`, then the root
pub fn message_payload(result: &Value) -> &Value {
    ["data", "payload"]
        .iter()
        .filter_map(|key| result.get(key))
        .find(|v| is_present(v))
        .unwrap_or(result)
}

/// Header value by name from `headers` or `payload.headers`. Names match case-insensitively.
pub fn header(message: &Value, name: &str) -> Option<String> {
    let headers = ["headers", "payload.headers"]
        .iter()
        .filter_map(|path| lookup(message, path))
        .find_map(Value::as_array)?;
    headers
        .iter()
        .find(|h| {
            h.get("name")
                .and_then(Value::as_str)
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|h| h.get("value"))
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
