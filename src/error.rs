//! Error types shared by the normalizer, storage and network layers.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failures of a single REST call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication required: please log in again ({status})")]
    Authentication { status: u16 },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API request failed: {status} {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status } | ApiError::Http { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            ApiError::Network(_) | ApiError::Parse(_) => None,
        }
    }
}

/// Console-wide error type.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Browser error: {0}")]
    Js(String),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl From<JsValue> for ConsoleError {
    fn from(value: JsValue) -> Self {
        ConsoleError::Js(js_message(&value))
    }
}

impl From<ConsoleError> for JsValue {
    fn from(err: ConsoleError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<ApiError> for JsValue {
    fn from(err: ApiError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Best-effort readable message out of a thrown JS value.
pub fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_messages_name_the_cause() {
        assert!(ApiError::Authentication { status: 401 }
            .to_string()
            .contains("Authentication"));
        assert_eq!(
            ApiError::Http { status: 500, message: "Internal Server Error".into() }.to_string(),
            "API request failed: 500 Internal Server Error"
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), Some(404));
    }

    #[test]
    fn console_error_wraps_api_error_transparently() {
        let err: ConsoleError = ApiError::NotFound("template 7".into()).into();
        assert_eq!(err.to_string(), "Resource not found: template 7");
    }
}
