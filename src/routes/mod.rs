//! HTTP handlers.
//!
//! Each submodule owns one endpoint family: its request parsing, the calls into
//! storage, and the JSON it returns.

pub mod fetch;
pub mod health;
pub mod reflection_id;
pub mod save;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// Parse a request body that must be a JSON object.
pub(crate) fn parse_json_object<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    if !value.is_object() {
        return Err(ApiError::BadRequest(
            "request body must be a JSON object".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
}

/// Coerce an optional JSON field to text.
///
/// Strings pass through, numbers and booleans become their textual form,
/// `null`/absent is `None`, and arrays or objects are rejected.
pub(crate) fn optional_text(field: &str, value: Option<Value>) -> Result<Option<String>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            Err(ApiError::invalid_field(field, "expected a string"))
        }
    }
}

/// Like [`optional_text`] but the trimmed value must be non-empty.
pub(crate) fn required_text(field: &str, value: Option<Value>) -> Result<String, ApiError> {
    optional_text(field, value)?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field(field))
}
