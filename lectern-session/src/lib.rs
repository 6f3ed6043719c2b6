//! # lectern-session
//!
//! Client session state for lectern.
//!
//! - **[`Session`]**: access token, refresh token and user profile
//! - **[`TokenStorage`]**: durable persistence of the token pair
//! - **[`SessionStore`]**: shared session context with a narrow mutation interface,
//!   a watchable state and a stream of [`SessionEvent`]s
//! - **[`RouteGuard`]**: access decisions for protected pages
//!
//! ## Example
//!
//! ```ignore
//! use lectern_session::{FileTokenStorage, SessionStore};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(FileTokenStorage::new("credentials.json"));
//! let store = SessionStore::restore(storage).await?;
//!
//! let mut events = store.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if event.requires_login() {
//!         // show the login screen
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod guard;
pub mod session;
pub mod storage;
pub mod store;

pub use error::{SessionError, SessionResult};
pub use guard::{Access, RouteGuard};
pub use session::{Role, Session, UserProfile};
pub use storage::{FileTokenStorage, InMemoryTokenStorage, StorageKey, TokenStorage};
pub use store::{ExpiryReason, SessionEvent, SessionStore};
