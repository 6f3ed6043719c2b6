//! Session and user profile types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an account on the learning platform.
///
/// Unknown roles are preserved verbatim so a newer server never breaks the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// A student: browses, subscribes to and watches courses.
    Student,
    /// A teacher: creates and edits courses and lessons.
    Teacher,
    /// Any role this client does not know about.
    Other(String),
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "student" => Self::Student,
            "teacher" => Self::Teacher,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile of the signed-in user as returned by the accounts API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Server-side user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Login name.
    pub username: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number in international format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Account role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Fields this client does not model, kept for lossless round-trips.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Create a profile with just a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
            phone_number: None,
            image: None,
            role: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Check whether the user holds `role`.
    pub fn has_role(&self, role: &Role) -> bool {
        self.role.as_ref() == Some(role)
    }
}

/// Client-side session: the credentials and profile of the signed-in user.
///
/// An empty session (all fields `None`) means nobody is signed in.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token attached to API calls.
    pub access_token: Option<String>,
    /// Long-lived token used to obtain a new access token.
    pub refresh_token: Option<String>,
    /// Profile of the signed-in user, once fetched.
    pub user: Option<UserProfile>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session holding a token pair.
    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_token: Some(access.into()),
            refresh_token: Some(refresh.into()),
            user: None,
        }
    }

    /// Whether an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Whether the session holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    /// Role of the signed-in user, if known.
    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().and_then(|u| u.role.as_ref())
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user.as_ref().map(|u| &u.username))
            .finish()
    }
}
