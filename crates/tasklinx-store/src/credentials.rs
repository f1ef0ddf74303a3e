//! Third-party OAuth credential rows.
//!
//! One row per user, replaced wholesale on every write.  Refresh logic
//! lives in `tasklinx-auth`; this module only persists what it is given.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Stored token set for one user.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token endpoint the refresh grant is sent to.
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: BTreeSet<String>,
    /// When the access token stops being valid; `None` means never.
    pub expiry: Option<DateTime<Utc>>,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Per-user credential persistence.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch the credentials stored for `user_id`, if any.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: &str) -> StoreResult<Option<UserCredentials>> {
        let user_id = user_id.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT user_id, access_token, refresh_token, token_uri, client_id, client_secret, scopes, expiry \
                     FROM user_credentials WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| {
                        Ok(CredentialRow {
                            user_id: row.get(0)?,
                            access_token: row.get(1)?,
                            refresh_token: row.get(2)?,
                            token_uri: row.get(3)?,
                            client_id: row.get(4)?,
                            client_secret: row.get(5)?,
                            scopes: row.get(6)?,
                            expiry: row.get(7)?,
                        })
                    },
                );
                match result {
                    Ok(row) => row.into_credentials().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Insert or replace the credentials for `creds.user_id`.
    #[instrument(skip(self, creds), fields(user_id = %creds.user_id))]
    pub async fn put(&self, creds: &UserCredentials) -> StoreResult<()> {
        if creds.user_id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "credentials must carry a user id".into(),
            ));
        }

        let scopes = serde_json::to_string(&creds.scopes)?;
        let expiry = creds.expiry.map(|t| t.timestamp());
        let creds = creds.clone();
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO user_credentials \
                     (user_id, access_token, refresh_token, token_uri, client_id, client_secret, scopes, expiry, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                       access_token = excluded.access_token, \
                       refresh_token = excluded.refresh_token, \
                       token_uri = excluded.token_uri, \
                       client_id = excluded.client_id, \
                       client_secret = excluded.client_secret, \
                       scopes = excluded.scopes, \
                       expiry = excluded.expiry, \
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        creds.user_id,
                        creds.access_token,
                        creds.refresh_token,
                        creds.token_uri,
                        creds.client_id,
                        creds.client_secret,
                        scopes,
                        expiry,
                        now
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!("credentials stored");
        Ok(())
    }
}

// ── row mapping ──────────────────────────────────────────────────────

struct CredentialRow {
    user_id: String,
    access_token: String,
    refresh_token: Option<String>,
    token_uri: String,
    client_id: String,
    client_secret: String,
    scopes: String,
    expiry: Option<i64>,
}

impl CredentialRow {
    fn into_credentials(self) -> StoreResult<UserCredentials> {
        let expiry = match self.expiry {
            Some(secs) => Some(DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                StoreError::CorruptRow {
                    entity: "user_credentials",
                    reason: format!("expiry {secs} out of range"),
                }
            })?),
            None => None,
        };
        Ok(UserCredentials {
            user_id: self.user_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_uri: self.token_uri,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scopes: serde_json::from_str(&self.scopes)?,
            expiry,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
