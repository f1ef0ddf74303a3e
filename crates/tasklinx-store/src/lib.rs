//! # tasklinx-store
//!
//! Storage engine for TaskLinx.
//!
//! Provides SQLite-backed persistence with WAL mode for the two pieces of
//! state the service keeps: per-user third-party OAuth credentials and the
//! per-user task history.  Both are stored one row per record and every
//! mutation runs inside a transaction, so concurrent requests cannot lose
//! each other's writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  HistoryStore      (task_history rows)   │
//! │  CredentialStore   (user_credentials)    │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, blocking pool)  │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The [`records`] module holds the domain types that flow through the
//! whole service (interpretations, execution results, task records).
//!
//! ## Quick start
//!
//! ```ignore
//! use tasklinx_store::{Database, HistoryStore};
//!
//! let db = Database::open_and_migrate("data/tasklinx.db").await?;
//! let history = HistoryStore::new(db.clone());
//! let recent = history.list("user-123", 20).await?;
//! ```

pub mod credentials;
pub mod db;
pub mod error;
pub mod history;
pub mod migration;
pub mod records;

// ── re-exports ───────────────────────────────────────────────────────

pub use credentials::{CredentialStore, UserCredentials};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use history::{HISTORY_RETENTION, HistoryStore};
pub use records::{
    ActionType, ExecutionResult, FailureKind, InterpretFailure, Interpretation, TaskRecord,
    TaskStatus,
};
