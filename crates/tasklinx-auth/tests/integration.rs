//! Integration tests for the tasklinx-auth crate.
//!
//! Google's token and userinfo endpoints are replaced with a wiremock
//! server; credentials land in a real on-disk SQLite database.

use chrono::{DateTime, Utc};
use serde_json::json;
use tasklinx_auth::{
    AuthError, CredentialManager, GoogleEndpoints, GoogleOAuthSettings, SessionSigner,
    TokenProvider,
};
use tasklinx_store::{CredentialStore, Database, UserCredentials};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn manager_for(server: &MockServer, dir: &tempfile::TempDir) -> (CredentialManager, CredentialStore) {
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();
    let store = CredentialStore::new(db);
    let manager = CredentialManager::new(
        GoogleOAuthSettings {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            redirect_uri: "http://localhost:3000/auth/callback".into(),
            endpoints: GoogleEndpoints {
                auth_url: format!("{}/o/oauth2/auth", server.uri()),
                token_url: format!("{}/token", server.uri()),
                userinfo_url: format!("{}/oauth2/v2/userinfo", server.uri()),
            },
        },
        SessionSigner::new(b"integration-secret").unwrap(),
        store.clone(),
    );
    (manager, store)
}

fn expired_credentials(user_id: &str, refresh: Option<&str>) -> UserCredentials {
    UserCredentials {
        user_id: user_id.into(),
        access_token: "stale-access".into(),
        refresh_token: refresh.map(str::to_string),
        token_uri: "ignored".into(),
        client_id: "cid".into(),
        client_secret: "csecret".into(),
        scopes: ["openid".to_string()].into_iter().collect(),
        expiry: DateTime::from_timestamp(Utc::now().timestamp() - 10, 0),
    }
}

#[tokio::test]
async fn exchange_code_persists_tokens_and_issues_session() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "google-access",
            "refresh_token": "google-refresh",
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": "openid email"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .and(header("Authorization", "Bearer google-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "108123",
            "email": "alice@example.com",
            "name": "Alice"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server, &dir).await;
    let user = manager.exchange_code("the-code").await.unwrap();

    assert_eq!(user.user_id, "108123");
    assert_eq!(user.user_info["email"], "alice@example.com");
    assert_eq!(manager.verify(&user.access_token).unwrap(), "108123");

    let stored = store.get("108123").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "google-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("google-refresh"));
    assert!(stored.scopes.contains("email"));
    assert!(stored.expiry.is_some());
}

#[tokio::test]
async fn exchange_code_rejected_is_invalid_grant() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Malformed auth code."
        })))
        .mount(&server)
        .await;

    let (manager, _) = manager_for(&server, &dir).await;
    match manager.exchange_code("bad").await.unwrap_err() {
        AuthError::InvalidGrant { reason } => assert_eq!(reason, "Malformed auth code."),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn userinfo_without_id_falls_back_to_sub() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a", "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "sub-77"})))
        .mount(&server)
        .await;

    let (manager, _) = manager_for(&server, &dir).await;
    let user = manager.exchange_code("c").await.unwrap();
    assert_eq!(user.user_id, "sub-77");
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=keep-me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_for(&server, &dir).await;
    store
        .put(&expired_credentials("u1", Some("keep-me")))
        .await
        .unwrap();

    let token = manager.authorized_token("u1").await.unwrap();
    assert_eq!(token.as_deref(), Some("fresh-access"));

    let stored = store.get("u1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("keep-me"));
    assert!(stored.expiry.unwrap() > Utc::now());

    // A second read uses the fresh token without another refresh.
    let again = manager.authorized_token("u1").await.unwrap();
    assert_eq!(again.as_deref(), Some("fresh-access"));
}

#[tokio::test]
async fn rejected_refresh_propagates() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let (manager, _) = manager_for(&server, &dir).await;
    manager
        .put(&expired_credentials("u1", Some("revoked")))
        .await
        .unwrap();

    let err = manager.get("u1").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
}

#[tokio::test]
async fn provider_outage_during_refresh_is_provider_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let (manager, _) = manager_for(&server, &dir).await;
    manager
        .put(&expired_credentials("u1", Some("rt")))
        .await
        .unwrap();

    match manager.get("u1").await.unwrap_err() {
        AuthError::ProviderError { status, .. } => assert_eq!(status, 503),
        other => panic!("unexpected error: {other}"),
    }
}
