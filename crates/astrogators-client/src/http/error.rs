/*
[INPUT]:  Error sources (transport, non-2xx responses, token refresh, storage)
[OUTPUT]: Structured error types with normalized server messages
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing error normalization
*/

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body extracted from a non-2xx response.
///
/// `message` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl NormalizedError {
    /// Build from a response status and its raw body.
    ///
    /// The status text is the default message. A JSON body overrides it with
    /// `message`, then `detail`, and contributes `detail`.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let mut error = NormalizedError {
            message: status_text(status),
            detail: None,
            status: Some(status.as_u16()),
        };

        let Ok(payload) = serde_json::from_slice::<serde_json::Value>(body) else {
            return error;
        };

        let text_field = |key: &str| {
            payload
                .get(key)
                .and_then(|value| value.as_str())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        if let Some(message) = text_field("message").or_else(|| text_field("detail")) {
            error.message = message;
        }

        error.detail = match payload.get("detail") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
        };

        error
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Why a token refresh did not produce a new access token.
///
/// Cloneable because every request waiting on the same refresh receives it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("token refresh rejected with status {status}")]
    Rejected { status: u16 },

    #[error("token refresh request failed: {0}")]
    Transport(String),

    #[error("token refresh returned an invalid body: {0}")]
    InvalidResponse(String),
}

/// Main error type for the astrogators client
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response was received
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("{0}")]
    Request(NormalizedError),

    /// Access token expired and could not be refreshed
    #[error("authentication failed")]
    AuthenticationFailed(#[source] RefreshError),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A header value could not be encoded
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Caller input rejected before any request was made
    #[error("{0}")]
    Validation(String),

    /// Local persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The shared client was used before it was initialized
    #[error("API client is not configured")]
    NotConfigured,
}

impl ApiError {
    /// HTTP status of the failed response, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request(error) => error.status,
            ApiError::Transport(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Normalized server error, if any
    pub fn normalized(&self) -> Option<&NormalizedError> {
        match self {
            ApiError::Request(error) => Some(error),
            _ => None,
        }
    }

    /// Check if error indicates the session is no longer authenticated
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::AuthenticationFailed(_)) || self.status() == Some(401)
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_error_prefers_message_field() {
        let body = br#"{"message": "Email already registered", "detail": "duplicate"}"#;
        let error = NormalizedError::from_response(StatusCode::CONFLICT, body);
        assert_eq!(error.message, "Email already registered");
        assert_eq!(error.detail.as_deref(), Some("duplicate"));
        assert_eq!(error.status, Some(409));
    }

    #[test]
    fn test_normalized_error_falls_back_to_detail() {
        let body = br#"{"detail": "Invalid credentials"}"#;
        let error = NormalizedError::from_response(StatusCode::BAD_REQUEST, body);
        assert_eq!(error.message, "Invalid credentials");
        assert_eq!(error.detail.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_normalized_error_keeps_status_text_for_non_json() {
        let error = NormalizedError::from_response(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert_eq!(error.message, "Bad Gateway");
        assert!(error.detail.is_none());
    }

    #[test]
    fn test_normalized_error_structured_detail() {
        let body = br#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}]}"#;
        let error = NormalizedError::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(error.message, "Unprocessable Entity");
        assert!(error.detail.unwrap().contains("field required"));
    }

    #[test]
    fn test_normalized_error_message_never_empty() {
        let status = StatusCode::from_u16(599).unwrap();
        let error = NormalizedError::from_response(status, br#"{"message": ""}"#);
        assert_eq!(error.message, "HTTP 599");
    }

    #[test]
    fn test_error_is_auth_error() {
        assert!(ApiError::AuthenticationFailed(RefreshError::MissingRefreshToken).is_auth_error());
        let expired = NormalizedError::from_response(StatusCode::UNAUTHORIZED, b"");
        assert!(ApiError::Request(expired).is_auth_error());
        let bad = NormalizedError::from_response(StatusCode::BAD_REQUEST, b"");
        assert!(!ApiError::Request(bad).is_auth_error());
    }

    #[test]
    fn test_authentication_failed_display() {
        let err = ApiError::AuthenticationFailed(RefreshError::Rejected { status: 401 });
        assert_eq!(err.to_string(), "authentication failed");
    }
}
