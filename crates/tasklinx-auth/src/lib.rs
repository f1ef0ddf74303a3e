//! Authentication for TaskLinx.
//!
//! Two unrelated kinds of token meet here:
//!
//! - **Third-party OAuth tokens** (Google) that let the executors act on a
//!   user's mailbox and calendar.  They are obtained through the
//!   authorization-code flow, persisted per user, refreshed transparently
//!   when they expire, and never shown to the caller.
//! - **Session tokens**, HS256-signed JWTs minted locally after a successful
//!   exchange, which the HTTP layer accepts as bearer credentials.
//!
//! # Architecture
//!
//! ```text
//! CredentialManager
//! ├── OAuthFlow        (authorization URL, code exchange, refresh grant)
//! ├── SessionSigner    (HS256 compact JWS)
//! └── CredentialStore  (tasklinx-store, one row per user)
//! ```
//!
//! Executors depend only on the [`TokenProvider`] trait, which
//! [`CredentialManager`] implements.

pub mod error;
pub mod manager;
pub mod oauth;
pub mod provider;
pub mod session;

pub use error::{AuthError, Result};
pub use manager::{AuthenticatedUser, CredentialManager, GOOGLE_SCOPES, GoogleEndpoints, GoogleOAuthSettings};
pub use oauth::{OAuthConfig, OAuthFlow, OAuthTokens};
pub use provider::TokenProvider;
pub use session::{SESSION_TTL_HOURS, SessionError, SessionSigner};
