//! # lectern - Authenticated API Client for the Lectern Learning Platform
//!
//! lectern talks to the platform's REST API on behalf of a signed-in user. It attaches
//! the session's bearer token to every call, renews an expired access token once and
//! resends, and ends the session (with an event instead of a forced navigation) when
//! the refresh token is no longer accepted.
//!
//! ## Quick Start
//!
//! ```ignore
//! use lectern::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     lectern::telemetry::init_tracing();
//!
//!     let config = ClientConfig::parse("https://lms.example.com/api/users/")?;
//!     let storage = Arc::new(FileTokenStorage::new("credentials.json"));
//!     let lectern = lectern::connect(config, storage).await?;
//!
//!     lectern.accounts().login(&Credentials::new("aziza", "s3cret")).await?;
//!     let profile: UserProfile = lectern
//!         .client()
//!         .send_json(&ApiRequest::get("profile/"))
//!         .await?;
//!     println!("signed in as {}", profile.username);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|--------|
//! | `accounts` | Register, login and profile endpoints | ✅ |
//!
//! ## Architecture
//!
//! - [`session`]: session state, token storage, events, route guard
//! - [`http`]: the authenticated client and single-flight token renewal
//! - [`accounts`]: account endpoints
//! - [`telemetry`]: tracing subscriber setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod connect;
pub mod telemetry;

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Session state and persistence.
pub use lectern_session as session;

/// Authenticated HTTP client.
pub use lectern_http as http;

/// Account endpoints.
#[cfg(feature = "accounts")]
#[cfg_attr(docsrs, doc(cfg(feature = "accounts")))]
pub use lectern_accounts as accounts;

// ============================================================================
// Flat Re-exports
// ============================================================================

pub use connect::{connect, connect_from_env, Lectern};

pub use lectern_session::{
    Access, ExpiryReason, FileTokenStorage, InMemoryTokenStorage, Role, RouteGuard, Session,
    SessionError, SessionEvent, SessionStore, StorageKey, TokenStorage, UserProfile,
};

pub use lectern_http::{
    ApiRequest, Attempt, AuthMode, AuthenticatedHttpClient, CancellationToken, ClientConfig,
    ClientError, ClientResult, FormPart, HttpTokenRefresher, RefreshCoordinator, RefreshError,
    TokenRefresher,
};

#[cfg(feature = "accounts")]
pub use lectern_accounts::{
    AccountsApi, Credentials, LoginResponse, ProfileUpdate, RegisterResponse, Registration,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        connect, ApiRequest, AuthMode, AuthenticatedHttpClient, CancellationToken, ClientConfig,
        ClientError, ClientResult, FileTokenStorage, InMemoryTokenStorage, Lectern, RouteGuard,
        Session, SessionEvent, SessionStore, UserProfile,
    };

    #[cfg(feature = "accounts")]
    pub use crate::{AccountsApi, Credentials, ProfileUpdate, Registration};
}
