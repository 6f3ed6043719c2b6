//! One-call setup of a session-bound client.
//!
//! ```rust,ignore
//! use lectern::connect::connect_from_env;
//!
//! // LECTERN_BASE_URL=https://lms.example.com/api/users/
//! let lectern = connect_from_env("LECTERN", "~/.config/lectern/credentials.json").await?;
//! if !lectern.session().is_authenticated() {
//!     lectern.accounts().login(&Credentials::new("aziza", "s3cret")).await?;
//! }
//! ```

use lectern_http::{AuthenticatedHttpClient, ClientConfig, ClientResult};
use lectern_session::{FileTokenStorage, SessionStore, TokenStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "accounts")]
use lectern_accounts::AccountsApi;

/// A restored session and the client bound to it.
#[derive(Debug, Clone)]
pub struct Lectern {
    client: AuthenticatedHttpClient,
}

impl Lectern {
    /// The authenticated client.
    pub fn client(&self) -> &AuthenticatedHttpClient {
        &self.client
    }

    /// The shared session.
    pub fn session(&self) -> &SessionStore {
        self.client.session()
    }

    /// Account endpoints bound to the same session.
    #[cfg(feature = "accounts")]
    #[cfg_attr(docsrs, doc(cfg(feature = "accounts")))]
    pub fn accounts(&self) -> AccountsApi {
        AccountsApi::new(self.client.clone())
    }
}

/// Restore the session held in `storage` and build a client for it.
pub async fn connect(
    config: ClientConfig,
    storage: Arc<dyn TokenStorage>,
) -> ClientResult<Lectern> {
    let session = SessionStore::restore(storage).await?;
    info!(
        base_url = %config.base_url,
        authenticated = session.is_authenticated(),
        "Client ready"
    );
    let client = AuthenticatedHttpClient::new(config, session)?;
    Ok(Lectern { client })
}

/// Like [`connect`], reading the configuration from `{prefix}_*` environment
/// variables and persisting tokens to `credentials`.
pub async fn connect_from_env(
    prefix: &str,
    credentials: impl Into<PathBuf>,
) -> ClientResult<Lectern> {
    let config = ClientConfig::from_env(prefix)?;
    connect(config, Arc::new(FileTokenStorage::new(credentials))).await
}
