//! Request and response payloads of the accounts endpoints.

use bytes::Bytes;
use lectern_http::FormPart;
use lectern_session::{Role, UserProfile};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Username and password for `login/`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// New account submitted to `register/`.
#[derive(Clone, Serialize)]
pub struct Registration {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Phone number in international format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Password.
    pub password: String,
    /// Password confirmation, checked by the server.
    pub password2: String,
    /// Requested role.
    pub role: Role,
}

impl Registration {
    /// Create a registration whose confirmation matches `password`.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<Role>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            phone_number: None,
            password2: password.clone(),
            password,
            role: role.into(),
        }
    }

    /// Set the phone number.
    #[must_use]
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    /// Set a confirmation that differs from the password.
    #[must_use]
    pub fn with_confirmation(mut self, password2: impl Into<String>) -> Self {
        self.password2 = password2.into();
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Answer of `register/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegisterResponse {
    /// Confirmation message for the user.
    #[serde(default)]
    pub message: Option<String>,
    /// Remaining fields, usually the created account.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of a successful login.
#[derive(Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    /// Access token.
    pub access: String,
    /// Refresh token.
    pub refresh: String,
    /// Profile of the signed-in user. Fetched from `profile/` when the login
    /// answer does not embed it.
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Avatar upload attached to a [`ProfileUpdate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type, e.g. `image/png`.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

/// Changes submitted to `profile/`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    /// New login name.
    pub username: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New phone number.
    pub phone_number: Option<String>,
    /// New avatar.
    pub image: Option<ImageUpload>,
}

impl ProfileUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Change the email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Change the phone number.
    #[must_use]
    pub fn phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    /// Upload a new avatar.
    #[must_use]
    pub fn image(
        mut self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.image = Some(ImageUpload {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        });
        self
    }

    /// Whether nothing would change.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.image.is_none()
    }

    /// Multipart fields for the update.
    pub fn to_parts(&self) -> Vec<FormPart> {
        let text = [
            ("username", &self.username),
            ("email", &self.email),
            ("phone_number", &self.phone_number),
        ];
        let mut parts: Vec<FormPart> = text
            .into_iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| FormPart::text(name, v.clone())))
            .collect();

        if let Some(image) = &self.image {
            parts.push(FormPart::file(
                "image",
                image.file_name.clone(),
                image.content_type.clone(),
                image.data.clone(),
            ));
        }
        parts
    }
}
