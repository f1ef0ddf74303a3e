//! REST API route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use tasklinx_store::HISTORY_RETENTION;

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

/// Page size when `/tasks/history` is called without `limit`.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// GET /  and  GET /health
// ---------------------------------------------------------------------------

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "TaskLinx API - AI-powered task automation",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness plus a database round trip.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "database health check failed");
            false
        }
    };
    Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "database": database,
    }))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// GET /auth/login: the Google consent URL.
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let auth_url = state
        .credentials
        .authorization_url()
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?;
    Ok(Json(json!({ "auth_url": auth_url })))
}

#[derive(Deserialize)]
pub struct CallbackBody {
    pub code: String,
}

/// POST /auth/callback: trade the authorization code for a session token.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CallbackBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .credentials
        .exchange_code(&body.code)
        .await
        .map_err(|e| {
            warn!(error = %e, "oauth callback failed");
            ApiError::bad_request(format!("Authentication failed: {e}"))
        })?;

    info!(user_id = %user.user_id, "user signed in");
    Ok(Json(json!({
        "access_token": user.access_token,
        "user_info": user.user_info,
    })))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TaskBody {
    pub task: String,
}

/// POST /tasks/execute
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<TaskBody>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .orchestrator
        .execute(&user_id, &body.task)
        .await
        .map_err(|e| ApiError::internal(format!("Task execution failed: {e}")))?;

    Ok(Json(json!({
        "success": record.result.success,
        "task_id": record.id,
        "result": record.result,
        "interpretation": record.interpretation,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    /// Requested page size, capped at what history can hold. Zero and
    /// negative values ask for nothing.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None => DEFAULT_HISTORY_LIMIT,
            Some(n) => usize::try_from(n).unwrap_or(0).min(HISTORY_RETENTION),
        }
    }
}

/// GET /tasks/history?limit=N
pub async fn task_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let tasks = state
        .orchestrator
        .history(&user_id, query.effective_limit())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to retrieve history: {e}")))?;
    Ok(Json(json!({ "tasks": tasks })))
}

// ---------------------------------------------------------------------------
// GET /user/profile
// ---------------------------------------------------------------------------

pub async fn profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    match state.credentials.get(&user_id).await {
        Ok(Some(_)) => Ok(Json(json!({ "user_id": user_id, "authenticated": true }))),
        Ok(None) => Err(ApiError::unauthorized("User not authenticated")),
        Err(e) => Err(ApiError::internal(format!("Failed to get profile: {e}"))),
    }
}
