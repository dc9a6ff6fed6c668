//! Error types for REST API calls.
//!
//! Provides structured error classification so callers can tell transport
//! failures from server-reported domain errors.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while talking to the payment API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The operation requires a bearer token and none is configured
    #[error("Not authenticated: no bearer token configured")]
    MissingCredential,

    /// Failed to reach the server or read its response
    #[error("Connection failed to '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded total timeout
    #[error("Request timeout after {duration}s")]
    Timeout { duration: u64 },

    /// Server answered with a non-2xx status; `message` is the server's text
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Server answered 2xx but reported the operation as unsuccessful
    #[error("{0}")]
    Rejected(String),

    /// Request body could not be serialized
    #[error("Failed to encode request for '{url}': {message}")]
    Encode { url: String, message: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode response from '{url}': {message}")]
    Decode { url: String, message: String },

    /// Base URL cannot carry path segments
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Build a status error from a non-2xx response body.
    ///
    /// Uses the body's `message` or `error` field verbatim (including the
    /// nested `{"error": {"message": ...}}` form), else the status reason.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| server_message(&value))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }

    /// HTTP status reported by the server, if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get error type string for logs and CLI output
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::MissingCredential => "missing_credential",
            ApiError::Transport { .. } => "transport_error",
            ApiError::Timeout { .. } => "request_timeout",
            ApiError::Status { .. } => "status_error",
            ApiError::Rejected(_) => "rejected",
            ApiError::Encode { .. } => "encode_error",
            ApiError::Decode { .. } => "decode_error",
            ApiError::InvalidUrl(_) => "invalid_url",
        }
    }
}

fn server_message(value: &serde_json::Value) -> Option<String> {
    let text = |v: &serde_json::Value| {
        v.as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(message) = value.get("message").and_then(text) {
        return Some(message);
    }
    match value.get("error") {
        Some(error) if error.is_string() => text(error),
        Some(error) => error.get("message").and_then(text),
        None => None,
    }
}
