//! Per-user Google credential management.
//!
//! [`CredentialManager`] runs the consent flow, persists the resulting
//! token set keyed by the Google account id, refreshes expired tokens on
//! read, and mints the session token the frontend presents afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tasklinx_store::{CredentialStore, UserCredentials};

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlow, OAuthTokens, generate_state, is_expired_at};
use crate::provider::TokenProvider;
use crate::session::{SessionError, SessionSigner};

/// Scopes requested during consent.
pub const GOOGLE_SCOPES: [&str; 5] = [
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/calendar.events",
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Google identity endpoints; overridable so tests can use a mock server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
        }
    }
}

/// Everything needed to talk to Google as this application.
#[derive(Debug, Clone)]
pub struct GoogleOAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Where Google sends the user back (`{frontend}/auth/callback`).
    pub redirect_uri: String,
    pub endpoints: GoogleEndpoints,
}

impl GoogleOAuthSettings {
    fn into_oauth_config(self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id,
            client_secret: Some(self.client_secret),
            auth_url: self.endpoints.auth_url,
            token_url: self.endpoints.token_url,
            redirect_uri: self.redirect_uri,
            scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
            extra_auth_params: vec![
                ("access_type".into(), "offline".into()),
                ("include_granted_scopes".into(), "true".into()),
                ("prompt".into(), "consent".into()),
            ],
        }
    }
}

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    /// Session token to hand back to the frontend.
    pub access_token: String,
    /// Profile as returned by the userinfo endpoint.
    pub user_info: Value,
}

// ---------------------------------------------------------------------------
// CredentialManager
// ---------------------------------------------------------------------------

/// Owns the OAuth flow, the session signer and the credential rows.
pub struct CredentialManager {
    flow: OAuthFlow,
    userinfo_url: String,
    signer: SessionSigner,
    store: CredentialStore,
    http: reqwest::Client,
}

impl CredentialManager {
    pub fn new(settings: GoogleOAuthSettings, signer: SessionSigner, store: CredentialStore) -> Self {
        let http = reqwest::Client::new();
        let userinfo_url = settings.endpoints.userinfo_url.clone();
        Self {
            flow: OAuthFlow::with_client(settings.into_oauth_config(), http.clone()),
            userinfo_url,
            signer,
            store,
            http,
        }
    }

    /// Consent URL with a fresh random `state`.
    pub fn authorization_url(&self) -> Result<String> {
        let state = generate_state()?;
        self.flow.authorization_url(&state)
    }

    /// Exchange `code`, look up who the user is, persist their tokens and
    /// mint a session token for them.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthenticatedUser> {
        let tokens = self.flow.exchange_code(code).await?;
        let user_info = self.fetch_user_info(&tokens.access_token).await?;

        let user_id = user_info["id"]
            .as_str()
            .or_else(|| user_info["sub"].as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AuthError::FlowFailed {
                reason: "userinfo response has no account id".into(),
            })?;

        let creds = self.credentials_from_tokens(&user_id, tokens, None);
        self.store.put(&creds).await?;

        let access_token = self.signer.issue(&user_id)?;
        tracing::info!(user_id = %user_id, "user authenticated");

        Ok(AuthenticatedUser {
            user_id,
            access_token,
            user_info,
        })
    }

    /// Stored credentials for `user_id`, refreshed first if expired.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenExpired`] if the token expired and there is no
    /// refresh token; any refresh failure propagates unchanged.
    pub async fn get(&self, user_id: &str) -> Result<Option<UserCredentials>> {
        let Some(creds) = self.store.get(user_id).await? else {
            return Ok(None);
        };

        let expires_at = creds.expiry.map(|t| t.timestamp());
        if !is_expired_at(expires_at, Utc::now().timestamp()) {
            return Ok(Some(creds));
        }

        tracing::debug!(user_id = %user_id, "access token expired, attempting refresh");

        let refresh_token = creds
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::TokenExpired {
                user_id: user_id.to_string(),
            })?;

        let tokens = self.flow.refresh_token(&refresh_token).await?;
        let refreshed = self.credentials_from_tokens(user_id, tokens, Some(&creds));
        self.store.put(&refreshed).await?;

        tracing::info!(user_id = %user_id, "token refreshed successfully");
        Ok(Some(refreshed))
    }

    /// Persist credentials as given.
    pub async fn put(&self, creds: &UserCredentials) -> Result<()> {
        self.store.put(creds).await?;
        Ok(())
    }

    /// Verify a session token and return the user id it was issued to.
    pub fn verify(&self, token: &str) -> std::result::Result<String, SessionError> {
        self.signer.verify(token)
    }

    // -- Internal helpers ---------------------------------------------------

    async fn fetch_user_info(&self, access_token: &str) -> Result<Value> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::FlowFailed {
                reason: format!("userinfo returned {status}: {body}"),
            });
        }

        Ok(response.json().await?)
    }

    /// Build the row to persist.  When refreshing, fields the provider did
    /// not resend (refresh token, scopes) are carried over from `previous`.
    fn credentials_from_tokens(
        &self,
        user_id: &str,
        tokens: OAuthTokens,
        previous: Option<&UserCredentials>,
    ) -> UserCredentials {
        let config = self.flow.config();

        let scopes = if !tokens.scopes.is_empty() {
            tokens.scopes.into_iter().collect()
        } else if let Some(prev) = previous {
            prev.scopes.clone()
        } else {
            config.scopes.iter().cloned().collect()
        };

        UserCredentials {
            user_id: user_id.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            token_uri: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            scopes,
            expiry: tokens
                .expires_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }
}

#[async_trait]
impl TokenProvider for CredentialManager {
    async fn authorized_token(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.get(user_id).await?.map(|c| c.access_token))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
