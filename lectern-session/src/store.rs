//! Shared session context with change notifications.
//!
//! [`SessionStore`] is the single owner of the client session. It is cheap to clone
//! and is injected into the HTTP client and the account endpoints. Writers go
//! through a narrow interface; readers either take a snapshot, watch the state, or
//! subscribe to [`SessionEvent`]s.

use crate::error::SessionResult;
use crate::session::{Session, UserProfile};
use crate::storage::{InMemoryTokenStorage, StorageKey, TokenStorage};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Why a session was forcibly ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// A call that requires authentication found no access token.
    MissingAccessToken,
    /// The access token was rejected and there was no refresh token to renew it.
    MissingRefreshToken,
    /// The refresh endpoint rejected the refresh token, or could not be reached.
    RefreshRejected,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingAccessToken => "no access token",
            Self::MissingRefreshToken => "no refresh token",
            Self::RefreshRejected => "token refresh failed",
        };
        f.write_str(text)
    }
}

/// Notification published whenever the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new token pair was stored.
    LoggedIn,
    /// The access token was renewed.
    TokenRefreshed {
        /// When the new token was stored.
        at: DateTime<Utc>,
    },
    /// The user profile changed.
    ProfileUpdated,
    /// The user signed out.
    LoggedOut,
    /// The session ended because it could not be kept alive.
    Expired {
        /// What ended it.
        reason: ExpiryReason,
    },
}

impl SessionEvent {
    /// Whether the presentation layer should send the user to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::LoggedOut | Self::Expired { .. })
    }
}

struct Inner {
    state: watch::Sender<Session>,
    events: broadcast::Sender<SessionEvent>,
    storage: Arc<dyn TokenStorage>,
    // Held across a state change and the storage writes that mirror it, so a
    // logout can never interleave with a half-persisted token update.
    writes: Mutex<()>,
}

/// Shared, observable session state backed by durable storage.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store with an empty session.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_session(storage, Session::new())
    }

    /// Create a store backed by in-memory storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTokenStorage::new()))
    }

    fn with_session(storage: Arc<dyn TokenStorage>, session: Session) -> Self {
        let (state, _) = watch::channel(session);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state,
                events,
                storage,
                writes: Mutex::new(()),
            }),
        }
    }

    /// Restore the session persisted in `storage`.
    ///
    /// Only tokens are persisted; the profile has to be fetched again.
    pub async fn restore(storage: Arc<dyn TokenStorage>) -> SessionResult<Self> {
        let access_token = storage.load(StorageKey::Access).await?;
        let refresh_token = storage.load(StorageKey::Refresh).await?;

        debug!(
            has_access = access_token.is_some(),
            has_refresh = refresh_token.is_some(),
            "Session restored from storage"
        );

        let session = Session {
            access_token,
            refresh_token,
            user: None,
        };
        Ok(Self::with_session(storage, session))
    }

    /// Current session.
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Current access token.
    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token.clone()
    }

    /// Current refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.state.borrow().refresh_token.clone()
    }

    /// Current user profile.
    pub fn user(&self) -> Option<UserProfile> {
        self.inner.state.borrow().user.clone()
    }

    /// Whether an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Watch the session state.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Store the token pair issued by a login.
    pub async fn set_tokens(
        &self,
        access: impl Into<String>,
        refresh: impl Into<String>,
    ) -> SessionResult<()> {
        let access = access.into();
        let refresh = refresh.into();
        let _writes = self.inner.writes.lock().await;

        self.inner.state.send_modify(|session| {
            session.access_token = Some(access.clone());
            session.refresh_token = Some(refresh.clone());
        });
        self.publish(SessionEvent::LoggedIn);
        info!("Session established");

        self.inner.storage.store(StorageKey::Access, &access).await?;
        self.inner.storage.store(StorageKey::Refresh, &refresh).await
    }

    /// Store a renewed access token, and the rotated refresh token if the server
    /// issued one.
    ///
    /// The update only applies while the session still holds `exchanged_refresh`,
    /// the refresh token the new access token was obtained with. Returns `false`
    /// and leaves session and storage untouched if the session was closed (or
    /// replaced by a new login) in the meantime.
    pub async fn update_access_token(
        &self,
        exchanged_refresh: &str,
        access: impl Into<String>,
        rotated_refresh: Option<String>,
    ) -> SessionResult<bool> {
        let access = access.into();
        let _writes = self.inner.writes.lock().await;

        let applied = self.inner.state.send_if_modified(|session| {
            if session.refresh_token.as_deref() != Some(exchanged_refresh) {
                return false;
            }
            session.access_token = Some(access.clone());
            if let Some(refresh) = &rotated_refresh {
                session.refresh_token = Some(refresh.clone());
            }
            true
        });
        if !applied {
            debug!("Session changed during token renewal, discarding new access token");
            return Ok(false);
        }

        self.publish(SessionEvent::TokenRefreshed { at: Utc::now() });
        debug!(rotated = rotated_refresh.is_some(), "Access token updated");

        self.inner.storage.store(StorageKey::Access, &access).await?;
        if let Some(refresh) = rotated_refresh {
            self.inner.storage.store(StorageKey::Refresh, &refresh).await?;
        }
        Ok(true)
    }

    /// Replace the user profile.
    pub fn set_user(&self, user: UserProfile) {
        self.inner.state.send_modify(|session| session.user = Some(user));
        self.publish(SessionEvent::ProfileUpdated);
    }

    /// Sign out: clear the session and its persisted credentials.
    ///
    /// Returns `true` if there was a session to clear.
    pub async fn logout(&self) -> SessionResult<bool> {
        let _writes = self.inner.writes.lock().await;
        let cleared = self.take();
        if cleared {
            info!("Session closed by user");
            self.publish(SessionEvent::LoggedOut);
        }
        self.inner.storage.clear().await?;
        Ok(cleared)
    }

    /// End the session because it cannot be kept alive.
    ///
    /// Publishes [`SessionEvent::Expired`] only if a session was actually cleared, so
    /// concurrent failures signal the presentation layer once.
    pub async fn expire(&self, reason: ExpiryReason) -> SessionResult<bool> {
        let _writes = self.inner.writes.lock().await;
        let cleared = self.take();
        if cleared {
            warn!(%reason, "Session expired");
            self.publish(SessionEvent::Expired { reason });
        }
        if let Err(e) = self.inner.storage.clear().await {
            warn!(error = %e, "Failed to remove persisted credentials");
            return Err(e);
        }
        Ok(cleared)
    }

    fn take(&self) -> bool {
        self.inner.state.send_if_modified(|session| {
            if session.is_empty() {
                return false;
            }
            *session = Session::new();
            true
        })
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
