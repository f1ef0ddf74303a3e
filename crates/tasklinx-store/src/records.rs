//! Domain records shared by every TaskLinx crate.
//!
//! An [`Interpretation`] is what the language model made of the user's
//! text, an [`ExecutionResult`] is what an executor did about it, and a
//! [`TaskRecord`] binds the two together with an id, a timestamp and a
//! [`TaskStatus`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════
//  Interpretation
// ═══════════════════════════════════════════════════════════════════════

/// The kind of action the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Email,
    Calendar,
    /// The model could not (or would not) map the text onto an action.
    Unknown,
    /// The model could not be reached at all.
    Error,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Calendar => "calendar",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an interpretation is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretFailure {
    /// The model call itself failed (network, auth, quota).
    LlmUnavailable,
    /// The model answered, but not with JSON.
    Unparseable,
    /// The model answered with JSON of the wrong shape.
    SchemaViolation,
}

/// Structured intent extracted from free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Model confidence, always within `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    /// The model's verbatim answer, kept when it could not be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<InterpretFailure>,
}

impl Interpretation {
    /// Look up a parameter, treating blank values as absent.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ExecutionResult
// ═══════════════════════════════════════════════════════════════════════

/// Closed classification of why an execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required parameters were missing; nothing was attempted.
    Validation,
    /// The interpretation did not name a supported action.
    UnsupportedAction,
    /// Credentials are missing, expired beyond refresh, or rejected.
    Authentication,
    /// Transient: network error, timeout, rate limit, provider outage.
    Retryable,
    /// The provider rejected the request for good.
    Permanent,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::UnsupportedAction => "unsupported_action",
            Self::Authentication => "authentication",
            Self::Retryable => "retryable",
            Self::Permanent => "permanent",
        };
        f.write_str(s)
    }
}

/// Outcome of one executor call.
///
/// Action-specific fields (`message_id`, `event_id`, `details`, ...) are
/// flattened next to `success` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExecutionResult {
    /// A successful result carrying the given fields.
    ///
    /// `fields` is normally a JSON object; anything else is stored under
    /// a single `value` key.
    pub fn ok(fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            success: true,
            error: None,
            error_kind: None,
            fields,
        }
    }

    /// A failed result with a classified reason.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            error_kind: Some(kind),
            fields: Map::new(),
        }
    }

    /// Access an action-specific field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  TaskRecord
// ═══════════════════════════════════════════════════════════════════════

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `Completed` iff the result succeeded.
    pub fn from_result(result: &ExecutionResult) -> Self {
        if result.success {
            Self::Completed
        } else {
            Self::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status `{other}`")),
        }
    }
}

/// The persisted outcome of one orchestrated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    /// Local ISO-8601 time the task finished.
    pub timestamp: String,
    pub user_input: String,
    pub interpretation: Interpretation,
    pub result: ExecutionResult,
    pub status: TaskStatus,
}

impl TaskRecord {
    /// Stamp a finished task with a fresh id, the current time, and the
    /// status implied by `result`.
    pub fn stamp(user_input: &str, interpretation: Interpretation, result: ExecutionResult) -> Self {
        Self::stamp_at(Local::now(), user_input, interpretation, result)
    }

    /// Like [`TaskRecord::stamp`] but with an explicit clock reading.
    pub fn stamp_at(
        now: DateTime<Local>,
        user_input: &str,
        interpretation: Interpretation,
        result: ExecutionResult,
    ) -> Self {
        let status = TaskStatus::from_result(&result);
        Self {
            id: task_id_at(now),
            timestamp: now.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            user_input: user_input.to_string(),
            interpretation,
            result,
            status,
        }
    }
}

/// `task_YYYYMMDD_HHMMSS_xxxxxxxx`: second-resolution prefix plus the
/// random tail of a UUID v7, so same-second tasks do not collide.
pub fn task_id_at(now: DateTime<Local>) -> String {
    let uuid = Uuid::now_v7().simple().to_string();
    let tail = &uuid[uuid.len() - 8..];
    format!("task_{}_{tail}", now.format("%Y%m%d_%H%M%S"))
}

// ── tests ────────────────────────────────────────────────────────────
