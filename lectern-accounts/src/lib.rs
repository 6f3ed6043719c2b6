//! # lectern-accounts
//!
//! Account endpoints of the lectern users API.
//!
//! [`AccountsApi`] wraps an [`AuthenticatedHttpClient`](lectern_http::AuthenticatedHttpClient)
//! and keeps the shared [`SessionStore`](lectern_session::SessionStore) in step with
//! what the server says: login stores the token pair and profile, logout clears them.
//!
//! ## Example
//!
//! ```ignore
//! use lectern_accounts::{AccountsApi, Credentials};
//!
//! let accounts = AccountsApi::new(client);
//! let login = accounts.login(&Credentials::new("aziza", "s3cret")).await?;
//! println!("signed in as {:?}", login.user.map(|u| u.username));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod types;

pub use api::AccountsApi;
pub use types::{
    Credentials, ImageUpload, LoginResponse, ProfileUpdate, RegisterResponse, Registration,
};
