//! Task orchestrator: one natural-language request in, one recorded
//! [`TaskRecord`] out.
//!
//! ```text
//! text ─► IntentInterpreter ─► validate ─► MailSender | EventCreator ─► HistoryStore
//! ```
//!
//! Nothing past interpretation raises: missing parameters, unsupported
//! actions and executor failures all end up in the record's result.

use std::sync::Arc;

use tracing::{info, instrument};

use tasklinx_adapters::{EventCreator, MailSender, NewEmail, NewEvent};
use tasklinx_store::{
    ActionType, ExecutionResult, FailureKind, HistoryStore, Interpretation, TaskRecord,
};

use crate::error::Result;
use crate::interpreter::IntentInterpreter;

/// Parameters an email task cannot run without.
pub const EMAIL_REQUIRED: &[&str] = &["recipient", "subject", "message"];

/// Parameters a calendar task cannot run without.
pub const CALENDAR_REQUIRED: &[&str] = &["title"];

/// Wires the interpreter, the executors and task history together.
pub struct TaskOrchestrator {
    interpreter: IntentInterpreter,
    mail: Arc<dyn MailSender>,
    calendar: Arc<dyn EventCreator>,
    history: HistoryStore,
}

impl TaskOrchestrator {
    pub fn new(
        interpreter: IntentInterpreter,
        mail: Arc<dyn MailSender>,
        calendar: Arc<dyn EventCreator>,
        history: HistoryStore,
    ) -> Self {
        Self {
            interpreter,
            mail,
            calendar,
            history,
        }
    }

    /// Interpret `text`, run the action it names, and append the outcome
    /// to `user_id`'s history.
    ///
    /// Only a history write failure is an error.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn execute(&self, user_id: &str, text: &str) -> Result<TaskRecord> {
        let interpretation = self.interpreter.interpret(text).await;
        let result = self.dispatch(user_id, &interpretation).await;
        let record = TaskRecord::stamp(text, interpretation, result);

        self.history.append(user_id, &record).await?;

        info!(
            task_id = %record.id,
            action = %record.interpretation.action_type,
            status = %record.status,
            error_kind = ?record.result.error_kind,
            retryable = record.result.error_kind.is_some_and(|k| k.is_retryable()),
            "task recorded"
        );
        Ok(record)
    }

    /// The user's most recent tasks, newest first.
    pub async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<TaskRecord>> {
        Ok(self.history.list(user_id, limit).await?)
    }

    async fn dispatch(&self, user_id: &str, interpretation: &Interpretation) -> ExecutionResult {
        match interpretation.action_type {
            ActionType::Email => {
                if let Some(failure) = require(interpretation, EMAIL_REQUIRED) {
                    return failure;
                }
                let email = NewEmail {
                    recipient: param(interpretation, "recipient"),
                    subject: param(interpretation, "subject"),
                    message: param(interpretation, "message"),
                };
                self.mail.send(user_id, &email).await
            }
            ActionType::Calendar => {
                if let Some(failure) = require(interpretation, CALENDAR_REQUIRED) {
                    return failure;
                }
                let event = NewEvent {
                    title: param(interpretation, "title"),
                    start_time: interpretation.param("start_time").map(str::to_string),
                    end_time: interpretation.param("end_time").map(str::to_string),
                    description: param(interpretation, "description"),
                };
                self.calendar.create(user_id, &event).await
            }
            other => ExecutionResult::failure(
                FailureKind::UnsupportedAction,
                format!("Unknown action type: {other}"),
            ),
        }
    }
}

/// A validation failure naming every missing field, in `fields` order.
fn require(interpretation: &Interpretation, fields: &[&str]) -> Option<ExecutionResult> {
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| interpretation.param(f).is_none())
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(ExecutionResult::failure(
        FailureKind::Validation,
        format!("Missing required fields: {}", missing.join(", ")),
    ))
}

fn param(interpretation: &Interpretation, key: &str) -> String {
    interpretation.param(key).unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
