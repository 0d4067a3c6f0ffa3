//! Vendor error bodies.

use atelier_error::VendorDetail;
use serde_json::Value;

const MAX_RAW_ERROR_LEN: usize = 500;

/// Extract structured detail from a vendor error body.
///
/// Understands the `{"error": {...}}` shape shared by OpenAI-compatible
/// APIs, Anthropic and Gemini (including Gemini's array-wrapped form), and
/// falls back to the raw body text.
///
/// # Examples
///
/// ```
/// use atelier_models::parse_vendor_error;
///
/// let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
/// let detail = parse_vendor_error(body);
/// assert_eq!(
///     detail.to_string(),
///     "Rate limit reached | type: requests | code: rate_limit_exceeded"
/// );
///
/// assert_eq!(parse_vendor_error("Bad Gateway").message, "Bad Gateway");
/// ```
pub fn parse_vendor_error(body: &str) -> VendorDetail {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && let Some(detail) = detail_from_value(&value)
    {
        return detail;
    }
    if trimmed.is_empty() {
        return VendorDetail::message("Empty error response");
    }
    let mut message: String = trimmed.chars().take(MAX_RAW_ERROR_LEN).collect();
    if message.len() < trimmed.len() {
        message.push_str("...");
    }
    VendorDetail::message(message)
}

/// Detail from a decoded body carrying an `error` member, if present.
pub(crate) fn detail_from_value(value: &Value) -> Option<VendorDetail> {
    let value = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match value.get("error")? {
        Value::String(message) => Some(VendorDetail::message(message.clone())),
        error @ Value::Object(_) => Some(detail_from_error(error)),
        _ => None,
    }
}

/// Detail from the inner error object.
pub(crate) fn detail_from_error(error: &Value) -> VendorDetail {
    VendorDetail {
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown provider error")
            .to_string(),
        error_type: field(error, "type").or_else(|| field(error, "status")),
        code: field(error, "code"),
        param: field(error, "param"),
    }
}

fn field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
