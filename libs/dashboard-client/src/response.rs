use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;

use crate::error::ApiError;

/// Maximum number of error-body bytes echoed into debug logs (8KB).
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Decode a 2xx body. Anything that is not a JSON document, including an
/// empty body, is [`ApiError::Decode`].
pub(crate) fn decode_success(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::Decode)
}

/// Turn a non-2xx response into [`ApiError::RequestFailed`].
///
/// Never fails: the backend's `{"detail": ...}` is used when the body is a
/// JSON object with a non-empty detail; anything else (non-JSON, arrays,
/// scalars, `null`/`false`/`0`/`""` details) falls back to the generic
/// `HTTP error! status: <code>` message.
pub(crate) fn failure_from_status(status: StatusCode, body: &Bytes) -> ApiError {
    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

    // Value::get only matches object keys
    let detail = parsed.get("detail").filter(|d| is_present(d)).cloned();

    let message = match &detail {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("HTTP error! status: {}", status.as_u16()),
    };

    if !body.is_empty() {
        tracing::debug!(
            status = status.as_u16(),
            body_preview = %body_preview(body),
            "error response body"
        );
    }

    ApiError::RequestFailed {
        status,
        message,
        detail,
    }
}

fn is_present(detail: &Value) -> bool {
    match detail {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn body_preview(body: &Bytes) -> String {
    let end = body.len().min(ERROR_BODY_PREVIEW_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
