use crate::client::ApiResponse;
use serde_json::Value;

/// Trimmed input, or `None` when nothing but whitespace was given.
pub(super) fn required(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// OMDb reports counts as strings; anything unparsable counts as zero.
pub(super) fn extract_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::String(count)) => count.trim().parse().unwrap_or(0),
        Some(Value::Number(count)) => count.as_u64().unwrap_or(0),
        _ => 0,
    }
}

pub(super) fn record(response: &ApiResponse) -> Option<Value> {
    response.data.clone().filter(|_| response.success)
}
