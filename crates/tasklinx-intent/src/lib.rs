//! Intent interpretation and task orchestration for TaskLinx.
//!
//! This crate provides:
//!
//! - **Intent interpretation**: free text to a validated
//!   [`Interpretation`](tasklinx_store::Interpretation) via a language
//!   model, see [`interpreter::IntentInterpreter`].
//! - **Orchestration**: interpret, validate parameters, dispatch to the
//!   mail or calendar executor, and record the outcome, see
//!   [`orchestrator::TaskOrchestrator`].

pub mod error;
pub mod interpreter;
pub mod orchestrator;

pub use error::{IntentError, Result};
pub use interpreter::{IntentInterpreter, validate_interpretation};
pub use orchestrator::{CALENDAR_REQUIRED, EMAIL_REQUIRED, TaskOrchestrator};
