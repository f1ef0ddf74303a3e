//! Error types for the auth crate.
//!
//! Everything except session verification surfaces through [`AuthError`];
//! session tokens have their own [`crate::SessionError`] so the HTTP layer
//! can match on it without pulling in provider failures.

use tasklinx_store::{FailureKind, StoreError};

/// Unified error type for OAuth and credential management.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access token has expired and no refresh token is available.
    #[error("token expired for user {user_id}")]
    TokenExpired {
        /// The user whose token expired.
        user_id: String,
    },

    /// The authorization server rejected the code or refresh token.
    #[error("invalid grant: {reason}")]
    InvalidGrant {
        /// Explanation from the authorization server.
        reason: String,
    },

    /// The authorization server answered with an unexpected status.
    #[error("token endpoint returned {status}: {reason}")]
    ProviderError { status: u16, reason: String },

    /// An HTTP request to the identity provider failed.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Credential persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The flow failed for a reason not covered above.
    #[error("authentication flow failed: {reason}")]
    FlowFailed {
        /// Details about why the flow failed.
        reason: String,
    },

    /// A session token could not be minted.
    #[error("session error: {0}")]
    Session(#[from] crate::session::SessionError),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AuthError {
    /// How an executor should report this error in a task result.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::TokenExpired { .. } | Self::InvalidGrant { .. } | Self::Session(_) => {
                FailureKind::Authentication
            }
            Self::ProviderError { status, .. } if *status == 429 || *status >= 500 => {
                FailureKind::Retryable
            }
            Self::NetworkError(e) if e.is_timeout() || e.is_connect() => FailureKind::Retryable,
            _ => FailureKind::Permanent,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
