//! End-to-end tests for the HTTP API.
//!
//! These tests spin up the real axum router on an OS-assigned ephemeral
//! port and drive it with `reqwest`. Google and the LLM provider are
//! wiremock servers; state lives in a temporary on-disk database.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tasklinx_adapters::{CalendarExecutor, GmailExecutor};
use tasklinx_auth::{
    CredentialManager, GoogleEndpoints, GoogleOAuthSettings, SessionSigner, TokenProvider,
};
use tasklinx_intent::{IntentInterpreter, TaskOrchestrator};
use tasklinx_llm::{LlmClient, LlmClientConfig};
use tasklinx_store::{CredentialStore, Database, HistoryStore, UserCredentials};
use tasklinx_web::{AppState, WebConfig, WebServer};

const SECRET: &[u8] = b"e2e-session-secret";
const FRONTEND: &str = "http://localhost:3000";

// ── helpers ──────────────────────────────────────────────────────────────────

struct TestApp {
    base: String,
    mock: MockServer,
    credentials: Arc<CredentialManager>,
    db: Database,
    client: reqwest::Client,
    _dir: TempDir,
    _shutdown: oneshot::Sender<()>,
}

impl TestApp {
    fn session_for(&self, user_id: &str) -> String {
        SessionSigner::new(SECRET).unwrap().issue(user_id).unwrap()
    }

    async fn get(&self, route: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(format!("{}{route}", self.base));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("request failed")
    }

    async fn post(&self, route: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(format!("{}{route}", self.base)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("request failed")
    }

    async fn store_google_tokens(&self, user_id: &str) {
        self.credentials
            .put(&UserCredentials {
                user_id: user_id.into(),
                access_token: "google-access".into(),
                refresh_token: Some("google-refresh".into()),
                token_uri: format!("{}/token", self.mock.uri()),
                client_id: "cid".into(),
                client_secret: "csecret".into(),
                scopes: ["openid".to_string()].into_iter().collect(),
                expiry: None,
            })
            .await
            .unwrap();
    }
}

async fn start_app() -> TestApp {
    let mock = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();

    let credentials = Arc::new(CredentialManager::new(
        GoogleOAuthSettings {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            redirect_uri: format!("{FRONTEND}/auth/callback"),
            endpoints: GoogleEndpoints {
                auth_url: format!("{}/o/oauth2/auth", mock.uri()),
                token_url: format!("{}/token", mock.uri()),
                userinfo_url: format!("{}/oauth2/v2/userinfo", mock.uri()),
            },
        },
        SessionSigner::new(SECRET).unwrap(),
        CredentialStore::new(db.clone()),
    ));

    let llm = LlmClient::new(LlmClientConfig::openai_compatible(
        "sk-test",
        "gpt-4",
        format!("{}/v1", mock.uri()),
    ))
    .unwrap();
    let tokens: Arc<dyn TokenProvider> = credentials.clone();
    let orchestrator = TaskOrchestrator::new(
        IntentInterpreter::new(Arc::new(llm)),
        Arc::new(GmailExecutor::with_base_url(tokens.clone(), mock.uri())),
        Arc::new(CalendarExecutor::with_base_url(tokens, mock.uri())),
        HistoryStore::new(db.clone()),
    );

    let state = AppState {
        credentials: credentials.clone(),
        orchestrator: Arc::new(orchestrator),
        db: db.clone(),
    };
    let config = WebConfig {
        bind_addr: "127.0.0.1".into(),
        port: 0,
        frontend_url: FRONTEND.into(),
    };
    let server = WebServer::new(config, state).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to port 0");
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve(listener, async {
                rx.await.ok();
            })
            .await
            .ok();
    });

    TestApp {
        base,
        mock,
        credentials,
        db,
        client: reqwest::Client::new(),
        _dir: dir,
        _shutdown: tx,
    }
}

fn completion(answer: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": answer.to_string()}, "finish_reason": "stop"}]
    }))
}

// ── unauthenticated routes ───────────────────────────────────────────────────

#[tokio::test]
async fn root_reports_running() {
    let app = start_app().await;
    let resp = app.get("/", None).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "TaskLinx API - AI-powered task automation");
    assert_eq!(body["status"], "running");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_checks_database() {
    let app = start_app().await;
    let body: Value = app.get("/health", None).await.json().await.unwrap();
    assert_eq!(body, json!({"status": "healthy", "database": true}));
}

#[tokio::test]
async fn login_returns_consent_url() {
    let app = start_app().await;
    let resp = app.get("/auth/login", None).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let url = body["auth_url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/o/oauth2/auth?", app.mock.uri())));
    assert!(url.contains("client_id=cid"));
    assert!(url.contains("access_type=offline"));
    assert!(url.contains("prompt=consent"));
    assert!(url.contains("state="));
}

#[tokio::test]
async fn callback_issues_session_for_google_account() {
    let app = start_app().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "google-access",
            "refresh_token": "google-refresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(&app.mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "108123",
            "email": "alice@example.com"
        })))
        .mount(&app.mock)
        .await;

    let resp = app.post("/auth/callback", None, json!({"code": "abc"})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user_info"]["email"], "alice@example.com");

    let session = body["access_token"].as_str().unwrap();
    let profile: Value = app.get("/user/profile", Some(session)).await.json().await.unwrap();
    assert_eq!(profile, json!({"user_id": "108123", "authenticated": true}));
}

#[tokio::test]
async fn rejected_callback_is_bad_request() {
    let app = start_app().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Bad Request"
        })))
        .mount(&app.mock)
        .await;

    let resp = app.post("/auth/callback", None, json!({"code": "stale"})).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Authentication failed: ")
    );
}

// ── bearer authentication ────────────────────────────────────────────────────

#[tokio::test]
async fn missing_bearer_is_unauthorized() {
    let app = start_app().await;
    let resp = app.post("/tasks/execute", None, json!({"task": "x"})).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Not authenticated");
}

#[tokio::test]
async fn forged_bearer_is_unauthorized() {
    let app = start_app().await;
    let forged = SessionSigner::new(b"some-other-secret")
        .unwrap()
        .issue("user-1")
        .unwrap();

    let resp = app.get("/tasks/history", Some(&forged)).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid authentication token");
}

#[tokio::test]
async fn profile_without_google_tokens_is_unauthorized() {
    let app = start_app().await;
    let token = app.session_for("user-1");

    let resp = app.get("/user/profile", Some(&token)).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "User not authenticated");
}

#[tokio::test]
async fn profile_with_rejected_refresh_is_server_error() {
    let app = start_app().await;
    app.credentials
        .put(&UserCredentials {
            user_id: "user-3".into(),
            access_token: "stale-access".into(),
            refresh_token: Some("revoked-refresh".into()),
            token_uri: format!("{}/token", app.mock.uri()),
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            scopes: ["openid".to_string()].into_iter().collect(),
            expiry: Some(Utc::now() - Duration::hours(1)),
        })
        .await
        .unwrap();
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .expect(1)
        .mount(&app.mock)
        .await;

    let token = app.session_for("user-3");
    let resp = app.get("/user/profile", Some(&token)).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Failed to get profile: "), "{detail}");
    assert!(detail.contains("revoked"), "{detail}");
}

// ── tasks ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn execute_email_task_then_list_history() {
    let app = start_app().await;
    app.store_google_tokens("user-1").await;
    let token = app.session_for("user-1");

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({
            "action_type": "email",
            "parameters": {"recipient": "bob@example.com", "subject": "Lunch", "message": "Noon?"},
            "confidence": 0.92,
            "reasoning": "email request"
        })))
        .mount(&app.mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/profile"))
        .and(header("authorization", "Bearer google-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"emailAddress": "me@example.com"})))
        .mount(&app.mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg-1"})))
        .expect(1)
        .mount(&app.mock)
        .await;

    let resp = app
        .post("/tasks/execute", Some(&token), json!({"task": "Ask Bob about lunch at noon"}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["message_id"], "msg-1");
    assert_eq!(body["interpretation"]["action_type"], "email");
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let history: Value = app
        .get("/tasks/history?limit=5", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    let tasks = history["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task_id.as_str());
    assert_eq!(tasks[0]["status"], "completed");
    assert_eq!(tasks[0]["user_input"], "Ask Bob about lunch at noon");
}

#[tokio::test]
async fn incomplete_task_is_failed_record_not_http_error() {
    let app = start_app().await;
    let token = app.session_for("user-2");

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({
            "action_type": "email",
            "parameters": {"recipient": "bob@example.com"},
            "confidence": 0.4
        })))
        .mount(&app.mock)
        .await;

    let resp = app
        .post("/tasks/execute", Some(&token), json!({"task": "email bob"}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["result"]["error"], "Missing required fields: subject, message");
    assert_eq!(body["result"]["error_kind"], "validation");
}

#[tokio::test]
async fn history_of_new_user_is_empty() {
    let app = start_app().await;
    let token = app.session_for("nobody");
    let body: Value = app
        .get("/tasks/history", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"tasks": []}));
}

#[tokio::test]
async fn history_limit_zero_returns_nothing() {
    let app = start_app().await;
    let token = app.session_for("user-4");
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({"action_type": "unknown", "parameters": {}})))
        .mount(&app.mock)
        .await;
    let resp = app
        .post("/tasks/execute", Some(&token), json!({"task": "hello"}))
        .await;
    assert_eq!(resp.status(), 200);

    let body: Value = app
        .get("/tasks/history?limit=0", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"tasks": []}));

    let body: Value = app
        .get("/tasks/history?limit=1", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn storage_failure_surfaces_as_server_error() {
    let app = start_app().await;
    let token = app.session_for("user-5");
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({"action_type": "unknown", "parameters": {}})))
        .mount(&app.mock)
        .await;
    app.db
        .execute(|conn| {
            conn.execute_batch("DROP TABLE task_history")?;
            Ok(())
        })
        .await
        .unwrap();

    let resp = app
        .post("/tasks/execute", Some(&token), json!({"task": "hello"}))
        .await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Task execution failed: "), "{detail}");

    let resp = app.get("/tasks/history", Some(&token)).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Failed to retrieve history: "), "{detail}");
}

// ── CORS ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn preflight_admits_frontend_origin_with_credentials() {
    let app = start_app().await;
    let resp = app
        .client
        .request(reqwest::Method::OPTIONS, format!("{}/tasks/execute", app.base))
        .header("Origin", FRONTEND)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization,content-type")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], FRONTEND);
    assert_eq!(headers["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn other_origins_get_no_cors_grant() {
    let app = start_app().await;
    let resp = app
        .client
        .get(format!("{}/", app.base))
        .header("Origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
