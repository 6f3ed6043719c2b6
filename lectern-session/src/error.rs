//! Session error types.

use thiserror::Error;

/// Errors raised while reading or persisting session credentials.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Filesystem error from a durable backend.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl SessionError {
    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = SessionError::backend("keychain locked");
        assert_eq!(err.to_string(), "Storage backend error: keychain locked");
    }

    #[test]
    fn test_from_serde_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SessionError = parse.into();
        assert!(matches!(err, SessionError::Serialization(_)));
    }
}
