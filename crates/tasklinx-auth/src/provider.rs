//! The seam executors use to obtain a usable access token.

use async_trait::async_trait;

use crate::error::Result;

/// Source of authorized third-party access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A currently valid access token for `user_id`, refreshing it first if
    /// needed.  `Ok(None)` means the user never authorized.
    async fn authorized_token(&self, user_id: &str) -> Result<Option<String>>;
}
