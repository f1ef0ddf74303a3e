//! Intent engine error types.
//!
//! Interpretation and execution failures are data on the returned
//! [`TaskRecord`](tasklinx_store::TaskRecord); only persistence can fail a
//! task outright.

use tasklinx_store::StoreError;

/// Unified error type for the intent crate.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// Reading or writing task history failed.
    #[error("history store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
