//! Accounts endpoints of the users API.

use crate::types::{Credentials, LoginResponse, ProfileUpdate, RegisterResponse, Registration};
use lectern_http::{ApiRequest, AuthenticatedHttpClient, ClientError, ClientResult};
use lectern_session::{SessionStore, UserProfile};
use tracing::{debug, info, warn};

/// Client for `register/`, `login/` and `profile/`.
///
/// Every successful call keeps the session in step: login stores the token pair and
/// the profile, profile reads and updates replace the stored profile.
#[derive(Debug, Clone)]
pub struct AccountsApi {
    client: AuthenticatedHttpClient,
    prefix: String,
}

impl AccountsApi {
    /// Create an API client rooted at the client's base URL.
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self {
            client,
            prefix: String::new(),
        }
    }

    /// Mount the endpoints under `prefix`, e.g. `users/`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        self
    }

    /// Underlying HTTP client.
    pub fn client(&self) -> &AuthenticatedHttpClient {
        &self.client
    }

    /// Session kept up to date by this API.
    pub fn session(&self) -> &SessionStore {
        self.client.session()
    }

    fn path(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.prefix)
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> ClientResult<RegisterResponse> {
        let request = ApiRequest::post(self.path("register/"))
            .json(registration)?
            .anonymous();

        let response: RegisterResponse = self.client.send_json(&request).await.map_err(|e| {
            warn!(username = %registration.username, error = %e, "Registration failed");
            e
        })?;

        info!(
            username = %registration.username,
            message = response.message.as_deref().unwrap_or_default(),
            "Account registered"
        );
        Ok(response)
    }

    /// Sign in and load the user's profile.
    ///
    /// The token pair is stored (and persisted) before the profile is requested, so
    /// the profile call is authenticated with the new session.
    pub async fn login(&self, credentials: &Credentials) -> ClientResult<LoginResponse> {
        let request = ApiRequest::post(self.path("login/"))
            .json(credentials)?
            .anonymous();

        let mut response: LoginResponse = self.client.send_json(&request).await.map_err(|e| {
            warn!(username = %credentials.username, error = %e, "Login failed");
            e
        })?;

        self.session()
            .set_tokens(response.access.clone(), response.refresh.clone())
            .await?;

        let user = match response.user.take() {
            Some(user) => {
                self.session().set_user(user.clone());
                user
            }
            None => self.profile().await?,
        };

        info!(username = %user.username, role = ?user.role, "Signed in");
        response.user = Some(user);
        Ok(response)
    }

    /// Fetch the signed-in user's profile.
    pub async fn profile(&self) -> ClientResult<UserProfile> {
        let user: UserProfile = self
            .client
            .send_json(&ApiRequest::get(self.path("profile/")))
            .await?;

        debug!(username = %user.username, "Profile loaded");
        self.session().set_user(user.clone());
        Ok(user)
    }

    /// Update the signed-in user's profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ClientResult<UserProfile> {
        if update.is_empty() {
            return Err(ClientError::InvalidRequest(
                "profile update has no changes".to_string(),
            ));
        }

        let request = ApiRequest::put(self.path("profile/")).multipart(update.to_parts());
        let user: UserProfile = self.client.send_json(&request).await.map_err(|e| {
            warn!(error = %e, "Profile update failed");
            e
        })?;

        info!(username = %user.username, "Profile updated");
        self.session().set_user(user.clone());
        Ok(user)
    }

    /// Sign out locally. Returns `false` if nobody was signed in.
    pub async fn logout(&self) -> ClientResult<bool> {
        Ok(self.session().logout().await?)
    }
}
