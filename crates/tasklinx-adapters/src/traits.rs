//! Executor seams used by the task orchestrator.

use async_trait::async_trait;
use tasklinx_store::ExecutionResult;

/// An email to send on a user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmail {
    pub recipient: String,
    pub subject: String,
    pub message: String,
}

/// A calendar event to create on a user's behalf.
///
/// Times are free text as extracted from the request; the executor
/// normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub description: String,
}

/// Sends email.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, user_id: &str, email: &NewEmail) -> ExecutionResult;
}

/// Creates calendar events.
#[async_trait]
pub trait EventCreator: Send + Sync {
    async fn create(&self, user_id: &str, event: &NewEvent) -> ExecutionResult;
}
