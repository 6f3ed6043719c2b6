//! HTTP client with bearer attachment and transparent token refresh.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
use crate::request::{ApiRequest, Attempt, AuthMode};
use lectern_session::{ExpiryReason, SessionStore};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client for the remote API.
///
/// Attaches the session's access token to every call. A 401 on the first
/// transmission renews the token once and resends; if renewal fails the session is
/// expired and the call fails with [`ClientError::SessionExpired`].
///
/// Cloning is cheap; clones share the session and the refresh gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedHttpClient {
    http: Client,
    config: Arc<ClientConfig>,
    session: SessionStore,
    refresh: Arc<RefreshCoordinator>,
}

impl AuthenticatedHttpClient {
    /// Create a client that renews tokens at `config.refresh_url()`.
    pub fn new(config: ClientConfig, session: SessionStore) -> ClientResult<Self> {
        let http = config.build_client()?;
        let refresher = HttpTokenRefresher::new(http.clone(), config.refresh_url()?);
        Ok(Self::with_refresher(config, session, http, Arc::new(refresher)))
    }

    /// Create a client with a custom HTTP client and token refresher.
    pub fn with_refresher(
        config: ClientConfig,
        session: SessionStore,
        http: Client,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            http,
            config: Arc::new(config),
            refresh: Arc::new(RefreshCoordinator::new(session.clone(), refresher)),
            session,
        }
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request.
    ///
    /// Returns the response for any non-error status. Error statuses become
    /// [`ClientError::ServerRejected`], except a first 401 which triggers one
    /// token renewal and resend.
    pub async fn send(&self, request: &ApiRequest) -> ClientResult<Response> {
        let url = self.config.resolve(request.path())?;
        let mode = request.auth_mode().unwrap_or(self.config.missing_token);

        let mut token = match (self.session.access_token(), mode) {
            (_, AuthMode::Anonymous) => None,
            (Some(token), _) => Some(token),
            (None, AuthMode::Optional) => None,
            (None, AuthMode::Required) => {
                warn!(
                    method = %request.method(),
                    url = %url,
                    "No access token for an authenticated request"
                );
                // `expire` logs storage failures itself.
                let _ = self.session.expire(ExpiryReason::MissingAccessToken).await;
                return Err(ClientError::Unauthenticated);
            }
        };

        let mut attempt = Attempt::First;
        loop {
            let response = self.transmit(request, &url, token.as_deref(), attempt).await?;

            // Anonymous calls have no token to renew; their 401 goes to the caller.
            if response.status() == StatusCode::UNAUTHORIZED && attempt.may_refresh() {
                if let Some(stale) = token.take() {
                    info!(
                        method = %request.method(),
                        url = %url,
                        "Access token rejected, renewing"
                    );
                    token = Some(self.refresh.renew(&stale).await?);
                    attempt = Attempt::Retried;
                    continue;
                }
            }

            return check_response(response, attempt).await;
        }
    }

    /// Send a request, giving up when `cancel` fires.
    ///
    /// Cancellation covers the whole flow, token renewal included, and leaves the
    /// session untouched unless renewal had already completed.
    pub async fn send_cancellable(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> ClientResult<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(method = %request.method(), path = request.path(), "Request cancelled");
                Err(ClientError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }

    /// Send a request and decode the JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ClientResult<T> {
        let response = self.send(request).await?;
        decode_json(response).await
    }

    /// GET `path`.
    pub async fn get(&self, path: &str) -> ClientResult<Response> {
        self.send(&ApiRequest::get(path)).await
    }

    /// DELETE `path`.
    pub async fn delete(&self, path: &str) -> ClientResult<Response> {
        self.send(&ApiRequest::delete(path)).await
    }

    /// POST a JSON body to `path`.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Response> {
        self.send(&ApiRequest::post(path).json(body)?).await
    }

    /// PUT a JSON body to `path`.
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Response> {
        self.send(&ApiRequest::put(path).json(body)?).await
    }

    /// PATCH a JSON body to `path`.
    pub async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Response> {
        self.send(&ApiRequest::patch(path).json(body)?).await
    }

    async fn transmit(
        &self,
        request: &ApiRequest,
        url: &Url,
        bearer: Option<&str>,
        attempt: Attempt,
    ) -> ClientResult<Response> {
        debug!(
            method = %request.method(),
            url = %url,
            attempt = attempt.number(),
            authenticated = bearer.is_some(),
            "Making HTTP request"
        );

        let builder = request.to_builder(&self.http, url.clone(), bearer)?;
        builder.send().await.map_err(|err| {
            warn!(
                method = %request.method(),
                url = %url,
                attempt = attempt.number(),
                error = %err,
                "HTTP request failed"
            );
            ClientError::Transient(err)
        })
    }
}

/// Turn error statuses into [`ClientError::ServerRejected`].
async fn check_response(response: Response, attempt: Attempt) -> ClientResult<Response> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let err = ClientError::rejected(status, body);
    if let ClientError::ServerRejected { message, .. } = &err {
        warn!(
            url = %url,
            status = status.as_u16(),
            attempt = attempt.number(),
            message = %message,
            "Request rejected by server"
        );
    }
    Err(err)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
