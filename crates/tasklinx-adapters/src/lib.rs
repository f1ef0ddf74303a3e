//! Action executors for TaskLinx.
//!
//! Each executor performs one kind of side effect on behalf of a user and
//! always answers with an [`ExecutionResult`](tasklinx_store::ExecutionResult):
//! failures are data, classified by [`FailureKind`](tasklinx_store::FailureKind),
//! never a Rust error escaping to the caller.

pub mod calendar;
pub mod error;
pub mod gmail;
mod http;
pub mod traits;

pub use calendar::{CalendarExecutor, EventTime, normalize_times, parse_event_time};
pub use error::{AdapterError, Result, classify_status};
pub use gmail::{GmailExecutor, build_mime_message};
pub use traits::{EventCreator, MailSender, NewEmail, NewEvent};

/// Reported when a user has no stored third-party credentials.
pub const CREDENTIALS_MISSING: &str = "User credentials not found. Please re-authenticate.";
