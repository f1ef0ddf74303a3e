//! Adapter error types.
//!
//! These never leave the crate as errors: each executor converts them into
//! a failed `ExecutionResult` carrying [`AdapterError::failure_kind`].

use tasklinx_auth::AuthError;
use tasklinx_store::FailureKind;

/// Unified error type for the executors.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The user has never authorized this application.
    #[error("no stored credentials for user {user_id}")]
    MissingCredentials { user_id: String },

    /// Obtaining or refreshing the access token failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// The provider answered with a non-success status.
    #[error("{operation} returned {status}: {body}")]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The request never produced a response (or its body was unreadable).
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered 2xx with a body we cannot use.
    #[error("{operation} returned an unexpected body: {reason}")]
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },
}

impl AdapterError {
    /// Classify this error for the task result.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::MissingCredentials { .. } => FailureKind::Authentication,
            Self::Auth(e) => e.failure_kind(),
            Self::Http { status, .. } => classify_status(*status),
            Self::Transport { source, .. } => {
                if source.is_timeout() || source.is_connect() {
                    FailureKind::Retryable
                } else {
                    FailureKind::Permanent
                }
            }
            Self::InvalidResponse { .. } => FailureKind::Permanent,
        }
    }
}

/// Map a non-success HTTP status onto a failure kind.
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        401 | 403 => FailureKind::Authentication,
        408 | 429 => FailureKind::Retryable,
        s if s >= 500 => FailureKind::Retryable,
        _ => FailureKind::Permanent,
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(401), FailureKind::Authentication);
        assert_eq!(classify_status(403), FailureKind::Authentication);
        assert_eq!(classify_status(408), FailureKind::Retryable);
        assert_eq!(classify_status(429), FailureKind::Retryable);
        assert_eq!(classify_status(500), FailureKind::Retryable);
        assert_eq!(classify_status(503), FailureKind::Retryable);
        assert_eq!(classify_status(400), FailureKind::Permanent);
        assert_eq!(classify_status(404), FailureKind::Permanent);
    }

    #[test]
    fn missing_credentials_is_authentication() {
        let err = AdapterError::MissingCredentials {
            user_id: "u1".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Authentication);
    }

    #[test]
    fn http_error_display() {
        let err = AdapterError::Http {
            operation: "gmail send",
            status: 400,
            body: "Invalid To header".into(),
        };
        assert_eq!(err.to_string(), "gmail send returned 400: Invalid To header");
        assert_eq!(err.failure_kind(), FailureKind::Permanent);
    }

    #[test]
    fn auth_errors_keep_their_classification() {
        let err = AdapterError::from(AuthError::InvalidGrant {
            reason: "revoked".into(),
        });
        assert_eq!(err.failure_kind(), FailureKind::Authentication);
        assert_eq!(err.to_string(), "invalid grant: revoked");
    }
}
