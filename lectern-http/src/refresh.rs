//! Access-token renewal.
//!
//! [`TokenRefresher`] exchanges a refresh token for a new access token.
//! [`RefreshCoordinator`] makes sure concurrent requests that hit 401 with the same
//! stale token share one exchange, and ends the session when renewal fails.

use crate::config::ClientConfig;
use crate::error::{extract_message, ClientError, ClientResult};
use async_trait::async_trait;
use lectern_session::{ExpiryReason, SessionStore};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Errors that can occur while renewing an access token.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// There is no refresh token to exchange.
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The token endpoint refused the refresh token.
    #[error("Refresh rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response payload.
        message: String,
    },

    /// The token endpoint answered 2xx without a usable access token.
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The token endpoint could not be reached.
    #[error("Refresh transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Tokens issued by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    /// New access token.
    pub access: String,
    /// Rotated refresh token, if the server rotates them.
    pub refresh: Option<String>,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform the exchange.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

/// Token refresher for a `POST {"refresh": ..} -> {"access": ..}` endpoint.
///
/// Uses a plain HTTP client: no bearer token, no interception.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    url: Url,
}

impl HttpTokenRefresher {
    /// Create a refresher posting to `url`.
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Create a refresher for the endpoint described by `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self::new(config.build_client()?, config.refresh_url()?))
    }

    /// Endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        debug!(url = %self.url, "Requesting new access token");

        let response = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message: extract_message(status, &body),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        let access = body
            .access
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RefreshError::InvalidResponse("missing access token".to_string()))?;

        Ok(RefreshedTokens {
            access,
            refresh: body.refresh.filter(|token| !token.is_empty()),
        })
    }
}

/// Single-flight access-token renewal bound to a session.
pub struct RefreshCoordinator {
    session: SessionStore,
    refresher: Arc<dyn TokenRefresher>,
    gate: Mutex<()>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator.
    pub fn new(session: SessionStore, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            session,
            refresher,
            gate: Mutex::new(()),
        }
    }

    /// Obtain an access token to replace `stale`, which the server just rejected.
    ///
    /// If another request already replaced `stale` while this one waited, the
    /// current token is returned without contacting the token endpoint. On failure
    /// the session is expired and [`ClientError::SessionExpired`] is returned.
    pub async fn renew(&self, stale: &str) -> ClientResult<String> {
        let _gate = self.gate.lock().await;

        if let Some(current) = self.session.access_token() {
            if current != stale {
                debug!("Access token already renewed by a concurrent request");
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            self.end_session(ExpiryReason::MissingRefreshToken).await;
            return Err(ClientError::session_expired(
                ExpiryReason::MissingRefreshToken,
                Some(RefreshError::MissingRefreshToken),
            ));
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(tokens) => {
                let access = tokens.access.clone();
                match self
                    .session
                    .update_access_token(&refresh_token, tokens.access, tokens.refresh)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        info!("Session closed during token renewal");
                        return Err(ClientError::session_expired(
                            ExpiryReason::MissingRefreshToken,
                            None,
                        ));
                    }
                    // The in-memory session already holds the new token.
                    Err(e) => warn!(error = %e, "Failed to persist renewed access token"),
                }
                info!("Access token renewed");
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "Access token renewal failed");
                self.end_session(ExpiryReason::RefreshRejected).await;
                Err(ClientError::session_expired(
                    ExpiryReason::RefreshRejected,
                    Some(err),
                ))
            }
        }
    }

    async fn end_session(&self, reason: ExpiryReason) {
        // `expire` logs storage failures itself.
        let _ = self.session.expire(reason).await;
    }
}
