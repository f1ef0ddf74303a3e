//! Locally issued session tokens.
//!
//! Compact JWS (`header.claims.signature`, each part base64url without
//! padding) signed with HMAC-SHA256.  Claims are `{sub, iat, exp}`; the
//! subject is the identity provider's stable user id.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifetime of a freshly issued session token.
pub const SESSION_TTL_HOURS: i64 = 24;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Why a session token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("signing secret is empty")]
    EmptySecret,

    #[error("malformed token: {reason}")]
    Malformed { reason: String },

    #[error("unsupported signing algorithm: {alg}")]
    UnsupportedAlgorithm { alg: String },

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired at {exp}")]
    Expired { exp: i64 },

    #[error("token has no subject")]
    MissingSubject,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    exp: i64,
}

/// Mints and verifies HS256 session tokens.
pub struct SessionSigner {
    key: hmac::Key,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionSigner {
    /// A signer with the default 24-hour lifetime.
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        })
    }

    /// Issue a token for `user_id`, valid from now.
    pub fn issue(&self, user_id: &str) -> Result<String, SessionError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token for `user_id` as if the clock read `now`.
    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        if user_id.is_empty() {
            return Err(SessionError::MissingSubject);
        }
        let claims = Claims {
            sub: Some(user_id.to_string()),
            iat: Some(now.timestamp()),
            exp: (now + self.ttl).timestamp(),
        };
        let claims_json = serde_json::to_vec(&claims).map_err(|e| SessionError::Malformed {
            reason: e.to_string(),
        })?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER_JSON),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref())))
    }

    /// Verify `token` and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` against the clock reading `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected three dot-separated parts"));
        };

        let header: Value = decode_json(header_b64, "header")?;
        let alg = header["alg"].as_str().unwrap_or_default();
        if alg != "HS256" {
            return Err(SessionError::UnsupportedAlgorithm {
                alg: alg.to_string(),
            });
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| malformed("signature is not base64url"))?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        hmac::verify(&self.key, signing_input.as_bytes(), &signature)
            .map_err(|_| SessionError::BadSignature)?;

        let claims: Claims = decode_json(claims_b64, "claims")?;
        if claims.exp <= now.timestamp() {
            return Err(SessionError::Expired { exp: claims.exp });
        }

        match claims.sub {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => Err(SessionError::MissingSubject),
        }
    }
}

fn malformed(reason: &str) -> SessionError {
    SessionError::Malformed {
        reason: reason.to_string(),
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(part: &str, what: &str) -> Result<T, SessionError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| malformed(&format!("{what} is not base64url")))?;
    serde_json::from_slice(&bytes).map_err(|e| SessionError::Malformed {
        reason: format!("{what}: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
