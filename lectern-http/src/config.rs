//! Client configuration.

use crate::error::{ClientError, ClientResult};
use crate::request::AuthMode;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use url::Url;

const DEFAULT_REFRESH_PATH: &str = "token/refresh/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

/// Configuration for an [`AuthenticatedHttpClient`](crate::AuthenticatedHttpClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every relative request path is resolved against.
    pub base_url: Url,
    /// Path of the token-refresh endpoint, relative to the base URL.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Request timeout. Serialized as (fractional) seconds.
    #[serde(
        rename = "timeout_seconds",
        default = "default_timeout",
        serialize_with = "serialize_secs",
        deserialize_with = "deserialize_secs"
    )]
    pub timeout: Duration,
    /// What to do when a request is sent without an access token.
    #[serde(default)]
    pub missing_token: AuthMode,
    /// Custom `User-Agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a config for the API at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: normalize_base(base_url),
            refresh_path: default_refresh_path(),
            timeout: default_timeout(),
            missing_token: AuthMode::default(),
            user_agent: None,
        }
    }

    /// Parse `base_url` and create a config for it.
    pub fn parse(base_url: &str) -> ClientResult<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base URL {base_url:?}: {e}")))?;
        Ok(Self::new(url))
    }

    /// Set the refresh endpoint path.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Set the request timeout. A zero timeout is rejected by
    /// [`build_client`](Self::build_client).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default behaviour for requests sent without an access token.
    #[must_use]
    pub fn with_missing_token(mut self, mode: AuthMode) -> Self {
        self.missing_token = mode;
        self
    }

    /// Set the `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Load from environment variables with given prefix.
    ///
    /// Looks for:
    /// - `{PREFIX}_BASE_URL` (required)
    /// - `{PREFIX}_REFRESH_PATH`
    /// - `{PREFIX}_TIMEOUT_SECS`
    pub fn from_env(prefix: &str) -> ClientResult<Self> {
        let key = format!("{}_BASE_URL", prefix);
        let base_url = std::env::var(&key)
            .map_err(|_| ClientError::Configuration(format!("{key} is not set")))?;
        let mut config = Self::parse(&base_url)?;

        if let Ok(path) = std::env::var(format!("{}_REFRESH_PATH", prefix)) {
            config.refresh_path = path;
        }

        let key = format!("{}_TIMEOUT_SECS", prefix);
        if let Ok(raw) = std::env::var(&key) {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    ClientError::Configuration(format!(
                        "{key} must be a positive number of seconds, got {raw:?}"
                    ))
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)://` URLs are used as-is.
    pub fn resolve(&self, path: &str) -> ClientResult<Url> {
        let parsed = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            normalize_base(self.base_url.clone()).join(path.trim_start_matches('/'))
        };
        parsed.map_err(|e| ClientError::InvalidRequest(format!("invalid path {path:?}: {e}")))
    }

    /// URL of the token-refresh endpoint.
    pub fn refresh_url(&self) -> ClientResult<Url> {
        self.resolve(&self.refresh_path)
    }

    /// Build an HTTP client with this config.
    pub fn build_client(&self) -> ClientResult<Client> {
        if self.timeout.is_zero() {
            return Err(ClientError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let mut builder = Client::builder().timeout(self.timeout());

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        builder
            .build()
            .map_err(|e| ClientError::Configuration(format!("building HTTP client: {e}")))
    }
}

fn serialize_secs<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timeout.as_secs_f64())
}

fn deserialize_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|timeout| !timeout.is_zero())
        .ok_or_else(|| {
            serde::de::Error::custom(format!(
                "timeout_seconds must be a positive number, got {secs}"
            ))
        })
}

// `Url::join` replaces the last segment unless the base path ends with a slash.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
