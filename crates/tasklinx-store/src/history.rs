//! Per-user task history.
//!
//! One row per [`TaskRecord`]; insertion order is the `seq` autoincrement
//! key.  Appending and trimming to [`HISTORY_RETENTION`] happen in the same
//! transaction, so the cap holds after every append and concurrent appends
//! never drop each other.

use chrono::Utc;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::records::{TaskRecord, TaskStatus};

/// Maximum number of records kept per user.
pub const HISTORY_RETENTION: usize = 100;

/// Append-only task log keyed by user.
#[derive(Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a record and drop that user's records beyond the newest
    /// [`HISTORY_RETENTION`].
    #[instrument(skip(self, record), fields(task_id = %record.id))]
    pub async fn append(&self, user_id: &str, record: &TaskRecord) -> StoreResult<()> {
        let user_id = user_id.to_string();
        let task_id = record.id.clone();
        let timestamp = record.timestamp.clone();
        let user_input = record.user_input.clone();
        let interpretation = serde_json::to_string(&record.interpretation)?;
        let result = serde_json::to_string(&record.result)?;
        let status = record.status.as_str();
        let now = Utc::now().timestamp();

        let trimmed = self
            .db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO task_history (user_id, task_id, timestamp, user_input, interpretation, result, status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![user_id, task_id, timestamp, user_input, interpretation, result, status, now],
                )?;
                let trimmed = tx.execute(
                    "DELETE FROM task_history WHERE user_id = ?1 AND seq NOT IN \
                     (SELECT seq FROM task_history WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2)",
                    rusqlite::params![user_id, HISTORY_RETENTION as i64],
                )?;
                tx.commit()?;
                Ok(trimmed)
            })
            .await?;

        debug!(trimmed, "task appended to history");
        Ok(())
    }

    /// Up to `limit` records for `user_id`, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: &str, limit: usize) -> StoreResult<Vec<TaskRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let user_id = user_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT task_id, timestamp, user_input, interpretation, result, status \
                     FROM task_history WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id, limit], |row| {
                        Ok(HistoryRow {
                            task_id: row.get(0)?,
                            timestamp: row.get(1)?,
                            user_input: row.get(2)?,
                            interpretation: row.get(3)?,
                            result: row.get(4)?,
                            status: row.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter().map(HistoryRow::into_record).collect()
            })
            .await
    }

    /// Number of records currently kept for `user_id`.
    #[instrument(skip(self))]
    pub async fn count(&self, user_id: &str) -> StoreResult<usize> {
        let user_id = user_id.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT count(*) FROM task_history WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )?;
                Ok(usize::try_from(count).unwrap_or_default())
            })
            .await
    }
}

// ── row mapping ──────────────────────────────────────────────────────

struct HistoryRow {
    task_id: String,
    timestamp: String,
    user_input: String,
    interpretation: String,
    result: String,
    status: String,
}

impl HistoryRow {
    fn into_record(self) -> StoreResult<TaskRecord> {
        let status: TaskStatus = self.status.parse().map_err(|reason| StoreError::CorruptRow {
            entity: "task_history",
            reason,
        })?;
        Ok(TaskRecord {
            id: self.task_id,
            timestamp: self.timestamp,
            user_input: self.user_input,
            interpretation: serde_json::from_str(&self.interpretation)?,
            result: serde_json::from_str(&self.result)?,
            status,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
