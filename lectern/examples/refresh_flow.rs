//! Token renewal against a local mock of the users API.
//!
//! Signs in, lets the access token expire, and shows the client renewing it
//! transparently. Then the refresh token is revoked and the session ends.
//!
//! Run with:
//! ```bash
//! RUST_LOG=lectern_http=debug,info cargo run --example refresh_flow
//! ```

use lectern::prelude::*;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lectern::telemetry::init_tracing();

    let server = MockServer::start().await;
    mount_users_api(&server).await;

    let config = ClientConfig::parse(&format!("{}/api/users/", server.uri()))?;
    let lectern = lectern::connect(config, Arc::new(InMemoryTokenStorage::new())).await?;

    let mut events = lectern.session().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  event: {event:?}");
            if event.requires_login() {
                println!("  -> back to the login screen");
            }
        }
    });

    println!("Signing in");
    let login = lectern
        .accounts()
        .login(&Credentials::new("aziza", "s3cret"))
        .await?;
    println!("Signed in as {:?}\n", login.user.map(|u| u.username));

    println!("Loading the profile with an access token the server no longer accepts");
    let profile = lectern.accounts().profile().await?;
    println!("Loaded {} after renewal\n", profile.username);

    println!("Revoking the refresh token");
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .mount(&server)
        .await;

    match lectern.accounts().profile().await {
        Err(err) if err.requires_login() => println!("Session ended: {err}"),
        other => println!("Unexpected outcome: {other:?}"),
    }
    println!("Authenticated: {}", lectern.session().is_authenticated());

    // Let the event printer drain.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Ok(())
}

async fn mount_users_api(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "first-access",
            "refresh": "refresh-1"
        })))
        .mount(server)
        .await;

    // The login answer has no profile, so it is fetched with the first token once.
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer first-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile()))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer first-access"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "second-access"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer second-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile()))
        .mount(server)
        .await;
}

fn profile() -> serde_json::Value {
    json!({
        "id": 1,
        "username": "aziza",
        "email": "aziza@example.com",
        "role": "teacher"
    })
}
