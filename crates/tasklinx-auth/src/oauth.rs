//! OAuth 2.0 Authorization Code Flow (RFC 6749) for a confidential client.
//!
//! # Flow Overview
//!
//! 1. Build an authorization URL carrying a random `state` and send the
//!    user there.
//! 2. The provider redirects back to the frontend with a `code`.
//! 3. Exchange the code for tokens at the token endpoint.
//! 4. Refresh the access token with the refresh grant when it expires.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};

/// Bytes of randomness in a `state` value (before base64 encoding).
const STATE_BYTES: usize = 32;

/// Tokens are treated as expired this many seconds early.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for an OAuth 2.0 authorization code flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,

    /// The OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,

    /// The authorization endpoint URL.
    pub auth_url: String,

    /// The token endpoint URL.
    pub token_url: String,

    /// The redirect URI registered with the authorization server.
    pub redirect_uri: String,

    pub scopes: Vec<String>,

    /// Provider-specific query parameters appended to the authorization URL
    /// (e.g. Google's `access_type=offline`).
    #[serde(default)]
    pub extra_auth_params: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Tokens returned by the authorization server after a successful exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used to authenticate API requests.
    pub access_token: String,

    /// The refresh token used to obtain new access tokens.
    pub refresh_token: Option<String>,

    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: Option<i64>,

    /// The token type (typically "Bearer").
    pub token_type: String,

    /// The scopes that were granted.
    pub scopes: Vec<String>,
}

/// Raw token response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Convert into [`OAuthTokens`], computing `expires_at` from `expires_in`.
    fn into_tokens(self) -> OAuthTokens {
        let expires_at = self
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp() + secs);

        let scopes = self
            .scope
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scopes,
        }
    }
}

/// Raw error response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate an unguessable `state` value (32 random bytes, base64url).
pub fn generate_state() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; STATE_BYTES];
    rng.fill(&mut bytes).map_err(|_| AuthError::FlowFailed {
        reason: "failed to generate state: CSPRNG error".to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Whether a token expiring at `expires_at` should be considered expired
/// at `now`.  Tokens without an expiry never expire.
pub fn is_expired_at(expires_at: Option<i64>, now: i64) -> bool {
    match expires_at {
        Some(expires_at) => now >= expires_at - EXPIRY_MARGIN_SECS,
        None => false,
    }
}

// ---------------------------------------------------------------------------
// OAuth flow
// ---------------------------------------------------------------------------

/// Stateless driver for the authorization code flow.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthFlow {
    /// Create a new OAuth flow with its own HTTP client.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a new OAuth flow sharing an existing HTTP client.
    pub fn with_client(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL the user should visit.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", &self.config.redirect_uri);

            if !self.config.scopes.is_empty() {
                params.append_pair("scope", &self.config.scopes.join(" "));
            }

            for (key, value) in &self.config.extra_auth_params {
                params.append_pair(key, value);
            }

            params.append_pair("state", state);
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidGrant`] if the server rejects the code,
    /// or [`AuthError::NetworkError`] on transport failure.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        tracing::debug!(token_url = %self.config.token_url, "exchanging authorization code");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        Self::parse_token_response(response).await
    }

    /// Refresh an access token using a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidGrant`] if the refresh token is invalid
    /// or revoked.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        tracing::debug!(token_url = %self.config.token_url, "refreshing access token");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        Self::parse_token_response(response).await
    }

    /// Parse the HTTP response from the token endpoint.
    async fn parse_token_response(response: reqwest::Response) -> Result<OAuthTokens> {
        let status = response.status();

        if status.is_success() {
            let token_response: TokenResponse = response.json().await?;
            tracing::debug!("token exchange successful");
            return Ok(token_response.into_tokens());
        }

        let body = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => err.error_description.unwrap_or(err.error),
            Err(_) => body,
        };

        // RFC 6749 §5.2: grant problems come back as 400 (or 401 for a bad
        // client); anything else is the provider misbehaving.
        if status.as_u16() == 400 || status.as_u16() == 401 {
            Err(AuthError::InvalidGrant { reason })
        } else {
            Err(AuthError::ProviderError {
                status: status.as_u16(),
                reason,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
