//! # lectern-http
//!
//! Authenticated HTTP client for the lectern API.
//!
//! ## Core Concepts
//!
//! - **[`AuthenticatedHttpClient`]**: attaches the session's bearer token, renews it
//!   once on 401 and resends, ends the session when renewal fails
//! - **[`ApiRequest`]**: immutable request value, resent as-is after a renewal
//! - **[`Attempt`]**: which transmission is in flight (`First` or `Retried`)
//! - **[`RefreshCoordinator`]**: single-flight token renewal
//! - **[`ClientError`]**: `Unauthenticated`, `SessionExpired`, `Transient`,
//!   `ServerRejected`, ...
//!
//! ## Example
//!
//! ```ignore
//! use lectern_http::{ApiRequest, AuthenticatedHttpClient, ClientConfig};
//! use lectern_session::{FileTokenStorage, SessionStore};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(FileTokenStorage::new("credentials.json"));
//! let session = SessionStore::restore(storage).await?;
//! let config = ClientConfig::parse("https://lms.example.com/api/users/")?;
//! let client = AuthenticatedHttpClient::new(config, session)?;
//!
//! let profile: serde_json::Value = client.send_json(&ApiRequest::get("profile/")).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod refresh;
pub mod request;

// Re-exports
pub use client::AuthenticatedHttpClient;
pub use config::ClientConfig;
pub use error::{extract_message, ClientError, ClientResult};
pub use refresh::{
    HttpTokenRefresher, RefreshCoordinator, RefreshError, RefreshedTokens, TokenRefresher,
};
pub use request::{ApiRequest, Attempt, AuthMode, FormPart, RequestBody};

// Re-exported so callers can cancel requests without a direct dependency.
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ApiRequest, AuthMode, AuthenticatedHttpClient, CancellationToken, ClientConfig,
        ClientError, ClientResult,
    };
}
