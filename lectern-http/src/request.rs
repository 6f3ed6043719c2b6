//! Outbound request values.
//!
//! An [`ApiRequest`] is immutable once built and cheap to clone, so the same value
//! can be transmitted again after a token refresh. Which transmission is in flight
//! is tracked separately by [`Attempt`].

use crate::error::{ClientError, ClientResult};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

/// Whether a request carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Attach the token; without one, fail fast with `Unauthenticated` and end the
    /// session.
    #[default]
    Required,
    /// Attach the token if there is one, otherwise send without credentials
    /// (public listings).
    Optional,
    /// Never attach the token (login, registration). A 401 goes straight to the
    /// caller.
    Anonymous,
}

/// Which transmission of a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The first transmission.
    First,
    /// The single resend after a token refresh.
    Retried,
}

impl Attempt {
    /// 1-based attempt number, for logs.
    pub fn number(self) -> u32 {
        match self {
            Self::First => 1,
            Self::Retried => 2,
        }
    }

    /// Whether a 401 on this attempt may trigger a refresh.
    pub fn may_refresh(self) -> bool {
        matches!(self, Self::First)
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document.
    Json(serde_json::Value),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// Raw bytes with an explicit content type.
    Bytes {
        /// Value of the `Content-Type` header.
        content_type: String,
        /// Payload.
        data: Bytes,
    },
    /// `multipart/form-data` fields, rebuilt for every transmission.
    Multipart(Vec<FormPart>),
}

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    name: String,
    value: FormValue,
}

#[derive(Debug, Clone, PartialEq)]
enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        data: Bytes,
    },
}

impl FormPart {
    /// A text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    /// A file field.
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                content_type: content_type.into(),
                data: data.into(),
            },
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this field carries a file.
    pub fn is_file(&self) -> bool {
        matches!(self.value, FormValue::File { .. })
    }
}

fn multipart_form(parts: &[FormPart]) -> ClientResult<Form> {
    parts.iter().try_fold(Form::new(), |form, part| {
        Ok(match &part.value {
            FormValue::Text(value) => form.text(part.name.clone(), value.clone()),
            FormValue::File {
                file_name,
                content_type,
                data,
            } => {
                let file = Part::bytes(data.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(content_type)
                    .map_err(|e| {
                        ClientError::InvalidRequest(format!(
                            "invalid content type for {}: {e}",
                            part.name
                        ))
                    })?;
                form.part(part.name.clone(), file)
            }
        })
    })
}

/// A call against the remote API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<RequestBody>,
    auth: Option<AuthMode>,
}

impl ApiRequest {
    /// Create a request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            auth: None,
        }
    }

    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Create a PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Create a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ClientResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("serializing body: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// Set a URL-encoded form body.
    #[must_use]
    pub fn form<K, V, I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(RequestBody::Form(fields));
        self
    }

    /// Set a raw body.
    #[must_use]
    pub fn bytes(mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes {
            content_type: content_type.into(),
            data: data.into(),
        });
        self
    }

    /// Set a `multipart/form-data` body.
    #[must_use]
    pub fn multipart(mut self, parts: impl IntoIterator<Item = FormPart>) -> Self {
        self.body = Some(RequestBody::Multipart(parts.into_iter().collect()));
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header. The session bearer token takes precedence over an
    /// `Authorization` header set here.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override the client's default [`AuthMode`].
    #[must_use]
    pub fn auth(mut self, mode: AuthMode) -> Self {
        self.auth = Some(mode);
        self
    }

    /// Shorthand for `auth(AuthMode::Anonymous)`.
    #[must_use]
    pub fn anonymous(self) -> Self {
        self.auth(AuthMode::Anonymous)
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path or absolute URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header overrides.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body, if any.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Auth mode override, if any.
    pub fn auth_mode(&self) -> Option<AuthMode> {
        self.auth
    }

    /// Build the transmission of this request to `url`.
    pub(crate) fn to_builder(
        &self,
        client: &Client,
        url: Url,
        bearer: Option<&str>,
    ) -> ClientResult<RequestBuilder> {
        let mut headers = self.headers.clone();
        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::InvalidRequest("access token is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = client.request(self.method.clone(), url).headers(headers);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }

        builder = match &self.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Bytes { content_type, data }) => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
            Some(RequestBody::Multipart(parts)) => builder.multipart(multipart_form(parts)?),
        };

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url() -> Url {
        Url::parse("https://lms.example.com/api/courses/list/").unwrap()
    }

    #[test]
    fn test_attempt() {
        assert!(Attempt::First.may_refresh());
        assert!(!Attempt::Retried.may_refresh());
        assert_eq!(Attempt::Retried.number(), 2);
    }

    #[test]
    fn test_json_body() {
        let request = ApiRequest::post("login/")
            .json(&serde_json::json!({"username": "a", "password": "b"}))
            .unwrap()
            .anonymous();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.auth_mode(), Some(AuthMode::Anonymous));
        assert_eq!(
            request.body(),
            Some(&RequestBody::Json(
                serde_json::json!({"username": "a", "password": "b"})
            ))
        );
    }

    #[test]
    fn test_bearer_replaces_authorization_override() {
        let request = ApiRequest::get("list/")
            .header(AUTHORIZATION, HeaderValue::from_static("Basic abc"))
            .query("page", "2");

        let built = request
            .to_builder(&Client::new(), url(), Some("tok"))
            .unwrap()
            .build()
            .unwrap();

        let values: Vec<_> = built.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer tok");
        assert_eq!(built.url().query(), Some("page=2"));
    }

    #[test]
    fn test_no_bearer_keeps_override() {
        let built = ApiRequest::get("list/")
            .header(AUTHORIZATION, HeaderValue::from_static("Basic abc"))
            .to_builder(&Client::new(), url(), None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(built.headers()[AUTHORIZATION], "Basic abc");
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let err = ApiRequest::get("list/")
            .to_builder(&Client::new(), url(), Some("bad\ntoken"))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn test_bytes_body_sets_content_type() {
        let built = ApiRequest::put("lessons/3/")
            .bytes("application/octet-stream", vec![1u8, 2, 3])
            .to_builder(&Client::new(), url(), None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(built.headers()[CONTENT_TYPE], "application/octet-stream");
    }

    #[test]
    fn test_multipart_body() {
        let request = ApiRequest::put("profile/").multipart([
            FormPart::text("username", "aziza"),
            FormPart::file("image", "me.png", "image/png", vec![0x89u8, b'P', b'N', b'G']),
        ]);

        let built = request
            .to_builder(&Client::new(), url(), Some("tok"))
            .unwrap()
            .build()
            .unwrap();

        let content_type = built.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        // Cloned requests rebuild the form from the same parts.
        assert_eq!(request.clone().body(), request.body());
    }

    #[test]
    fn test_multipart_rejects_bad_content_type() {
        let err = ApiRequest::put("profile/")
            .multipart([FormPart::file("image", "me.png", "not a mime", vec![1u8])])
            .to_builder(&Client::new(), url(), None)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
