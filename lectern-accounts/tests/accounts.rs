//! Account flows against a mock users API.

use lectern_accounts::{AccountsApi, Credentials, ProfileUpdate, Registration};
use lectern_http::{AuthenticatedHttpClient, ClientConfig, ClientError};
use lectern_session::{
    InMemoryTokenStorage, Role, SessionEvent, SessionStore, StorageKey,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(storage: InMemoryTokenStorage) -> (MockServer, Arc<InMemoryTokenStorage>, AccountsApi) {
    let server = MockServer::start().await;
    let storage = Arc::new(storage);
    let session = SessionStore::restore(storage.clone()).await.unwrap();
    let config = ClientConfig::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = AuthenticatedHttpClient::new(config, session).unwrap();
    let api = AccountsApi::new(client).with_prefix("users");
    (server, storage, api)
}

fn profile_body() -> serde_json::Value {
    json!({
        "id": 7,
        "username": "aziza",
        "email": "aziza@example.com",
        "phone_number": "+998901234567",
        "image": null,
        "role": "teacher"
    })
}

#[tokio::test]
async fn login_stores_tokens_and_profile() {
    let (server, storage, api) = setup(InMemoryTokenStorage::new()).await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .and(body_json(json!({"username": "aziza", "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut events = api.session().subscribe();
    let login = api
        .login(&Credentials::new("aziza", "s3cret"))
        .await
        .unwrap();

    let user = login.user.unwrap();
    assert_eq!(user.username, "aziza");
    assert_eq!(user.role, Some(Role::Teacher));

    let session = api.session().snapshot();
    assert_eq!(session.access_token.as_deref(), Some("a1"));
    assert_eq!(session.refresh_token.as_deref(), Some("r1"));
    assert_eq!(session.user.map(|u| u.id), Some(Some(7)));
    assert_eq!(storage.get(StorageKey::Access), Some("a1".to_string()));
    assert_eq!(storage.get(StorageKey::Refresh), Some("r1".to_string()));

    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedIn);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::ProfileUpdated);
}

#[tokio::test]
async fn login_with_embedded_user_skips_profile_call() {
    let (server, _storage, api) = setup(InMemoryTokenStorage::new()).await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "user": profile_body()
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(0)
        .mount(&server)
        .await;

    api.login(&Credentials::new("aziza", "s3cret")).await.unwrap();

    assert_eq!(api.session().user().map(|u| u.username), Some("aziza".to_string()));
}

#[tokio::test]
async fn failed_login_leaves_session_empty() {
    let (server, storage, api) = setup(InMemoryTokenStorage::new()).await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = api
        .login(&Credentials::new("aziza", "wrong"))
        .await
        .unwrap_err();

    match err {
        ClientError::ServerRejected { status, message, .. } => {
            assert_eq!(status, 401);
            assert_eq!(message, "No active account found with the given credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(api.session().snapshot().is_empty());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn register_is_anonymous() {
    let (server, _storage, api) = setup(InMemoryTokenStorage::new()).await;

    Mock::given(method("POST"))
        .and(path("/api/users/register/"))
        .and(body_json(json!({
            "username": "bek",
            "email": "bek@example.com",
            "password": "pa55word",
            "password2": "pa55word",
            "role": "student"
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"message": "User registered successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = api
        .register(&Registration::new("bek", "bek@example.com", "pa55word", Role::Student))
        .await
        .unwrap();

    assert_eq!(response.message.as_deref(), Some("User registered successfully"));
    assert!(!api.session().is_authenticated());
    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn register_surfaces_field_errors() {
    let (server, _storage, api) = setup(InMemoryTokenStorage::new()).await;

    Mock::given(method("POST"))
        .and(path("/api/users/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "username": ["A user with that username already exists."]
        })))
        .mount(&server)
        .await;

    let err = api
        .register(&Registration::new("bek", "bek@example.com", "pa55word", "student"))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "HTTP 400: username: A user with that username already exists."
    );
}

#[tokio::test]
async fn profile_renews_expired_token() {
    let (server, storage, api) = setup(InMemoryTokenStorage::with_tokens("stale", "r1")).await;

    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;

    let user = api.profile().await.unwrap();

    assert_eq!(user.email.as_deref(), Some("aziza@example.com"));
    assert_eq!(storage.get(StorageKey::Access), Some("fresh".to_string()));
    assert_eq!(api.session().user(), Some(user));
}

#[tokio::test]
async fn update_profile_sends_multipart() {
    let (server, _storage, api) = setup(InMemoryTokenStorage::with_tokens("a1", "r1")).await;

    let mut updated = profile_body();
    updated["email"] = json!("new@example.com");
    Mock::given(method("PUT"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer a1"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("new@example.com"))
        .and(body_string_contains("filename=\"me.png\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    let mut events = api.session().subscribe();
    let user = api
        .update_profile(
            &ProfileUpdate::new()
                .email("new@example.com")
                .image("me.png", "image/png", b"png-bytes".to_vec()),
        )
        .await
        .unwrap();

    assert_eq!(user.email.as_deref(), Some("new@example.com"));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::ProfileUpdated);
}

#[tokio::test]
async fn logout_clears_everything() {
    let (_server, storage, api) = setup(InMemoryTokenStorage::with_tokens("a1", "r1")).await;

    let mut events = api.session().subscribe();
    assert!(api.logout().await.unwrap());

    assert!(storage.is_empty());
    assert!(!api.session().is_authenticated());
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(!api.logout().await.unwrap());
}
