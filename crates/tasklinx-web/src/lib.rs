//! HTTP API for TaskLinx.
//!
//! An axum router over the credential manager and the task orchestrator:
//!
//! - `GET /` and `GET /health` for liveness.
//! - `GET /auth/login` and `POST /auth/callback` for the Google consent flow.
//! - `POST /tasks/execute`, `GET /tasks/history` and `GET /user/profile`
//!   behind a bearer session token.

pub mod api;
pub mod error;
pub mod extract;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use extract::AuthUser;
pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// Origin of the browser frontend; the only origin CORS admits.
    pub frontend_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8000,
            frontend_url: "http://localhost:3000".into(),
        }
    }
}
