//! Shared application state for the web server.

use std::sync::Arc;

use tasklinx_auth::CredentialManager;
use tasklinx_intent::TaskOrchestrator;
use tasklinx_store::Database;

/// Shared state accessible from every axum handler.
#[derive(Clone)]
pub struct AppState {
    /// OAuth flow, session tokens and stored Google credentials.
    pub credentials: Arc<CredentialManager>,

    /// Interprets and runs tasks, and serves their history.
    pub orchestrator: Arc<TaskOrchestrator>,

    /// Database handle for health checks.
    pub db: Database,
}
