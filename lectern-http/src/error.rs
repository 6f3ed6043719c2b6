//! Client error types.

use crate::refresh::RefreshError;
use lectern_session::{ExpiryReason, SessionError};
use reqwest::StatusCode;
use thiserror::Error;

const MAX_MESSAGE_CHARS: usize = 200;

/// Errors returned by [`AuthenticatedHttpClient`](crate::AuthenticatedHttpClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// A request that requires authentication was made without an access token.
    /// The session has been ended.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The access token expired and could not be renewed. The session has been ended.
    #[error("Session expired: {reason}")]
    SessionExpired {
        /// What ended the session.
        reason: ExpiryReason,
        /// The refresh failure, if a refresh was attempted.
        #[source]
        source: Option<RefreshError>,
    },

    /// Network failure or timeout. The caller may retry.
    #[error("Transport error: {0}")]
    Transient(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("HTTP {status}: {message}")]
    ServerRejected {
        /// HTTP status code.
        status: u16,
        /// Human-readable message extracted from the response payload.
        message: String,
        /// Raw response body.
        body: String,
    },

    /// A successful response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client is misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,

    /// Session storage failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    /// Create a session-expired error.
    pub fn session_expired(reason: ExpiryReason, source: Option<RefreshError>) -> Self {
        Self::SessionExpired { reason, source }
    }

    /// Create a server-rejected error from a status and raw body.
    pub fn rejected(status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::ServerRejected {
            status: status.as_u16(),
            message: extract_message(status, &body),
            body,
        }
    }

    /// Get the HTTP status if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerRejected { status, .. } => Some(*status),
            Self::Transient(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::ServerRejected { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Whether the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired { .. })
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Pull a human-readable message out of an error payload.
///
/// Understands `{"message": ..}`, `{"detail": ..}`, `{"error": ..}` and field error
/// maps such as `{"email": ["already taken"]}`. Falls back to the (truncated) raw
/// body, then to the status reason.
pub fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "detail", "error", "non_field_errors"] {
            if let Some(text) = map.get(key).and_then(first_text) {
                return text;
            }
        }
        for (field, value) in &map {
            if let Some(text) = first_text(value) {
                return format!("{field}: {text}");
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string();
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        let mut short: String = trimmed.chars().take(MAX_MESSAGE_CHARS).collect();
        short.push('…');
        return short;
    }
    trimmed.to_string()
}

fn first_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"message": "Course not found"}"#, "Course not found")]
    #[case(r#"{"detail": "Given token not valid for any token type", "code": "token_not_valid"}"#, "Given token not valid for any token type")]
    #[case(r#"{"non_field_errors": ["Passwords do not match"]}"#, "Passwords do not match")]
    #[case(r#"{"username": ["A user with that username already exists."]}"#, "username: A user with that username already exists.")]
    #[case("Internal Server Error", "Internal Server Error")]
    #[case("", "Bad Request")]
    fn test_extract_message(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(extract_message(StatusCode::BAD_REQUEST, body), expected);
    }

    #[test]
    fn test_extract_message_truncates() {
        let body = "x".repeat(500);
        let message = extract_message(StatusCode::BAD_GATEWAY, &body);
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS + 1);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::rejected(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(ClientError::rejected(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!ClientError::rejected(StatusCode::BAD_REQUEST, "").is_retryable());
        assert!(!ClientError::Unauthenticated.is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
    }

    #[test]
    fn test_requires_login() {
        assert!(ClientError::Unauthenticated.requires_login());
        assert!(ClientError::session_expired(ExpiryReason::RefreshRejected, None).requires_login());
        assert!(!ClientError::rejected(StatusCode::UNAUTHORIZED, "").requires_login());
    }

    #[test]
    fn test_status() {
        let err = ClientError::rejected(StatusCode::NOT_FOUND, r#"{"detail": "Not found."}"#);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: Not found.");
        assert_eq!(ClientError::Unauthenticated.status(), None);
    }
}
