//! Email executor backed by the Gmail REST API.
//!
//! Sending is two calls: `users/me/profile` for the sender address, then
//! `users/me/messages/send` with the RFC 5322 message as URL-safe base64.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde_json::{Value, json};
use tasklinx_auth::TokenProvider;
use tasklinx_store::{ExecutionResult, FailureKind};
use tracing::{debug, info, warn};

use crate::CREDENTIALS_MISSING;
use crate::error::{AdapterError, Result};
use crate::http::{read_json, required_str};
use crate::traits::{MailSender, NewEmail};

/// Production Gmail API host.
pub const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com";

// ---------------------------------------------------------------------------
// Message building
// ---------------------------------------------------------------------------

/// Build a plain-text RFC 5322 message with CRLF line endings.
///
/// Header values have CR/LF stripped. A non-ASCII subject, and any
/// non-ASCII display name in `To`/`From`, is RFC 2047 B-encoded.
pub fn build_mime_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    let subject = sanitize_header(subject);
    let subject = if subject.is_ascii() {
        subject
    } else {
        encoded_word(&subject)
    };
    let encoding = if body.is_ascii() { "7bit" } else { "8bit" };
    let body = body.replace("\r\n", "\n").replace('\n', "\r\n");

    format!(
        "To: {to}\r\n\
         From: {from}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"utf-8\"\r\n\
         Content-Transfer-Encoding: {encoding}\r\n\
         \r\n\
         {body}",
        to = address_header(to),
        from = address_header(from),
    )
}

fn sanitize_header(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

fn encoded_word(text: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(text.as_bytes()))
}

/// Sanitize an address list and encode non-ASCII display names. The
/// addresses themselves are left as written.
fn address_header(value: &str) -> String {
    let value = sanitize_header(value);
    if value.is_ascii() {
        return value;
    }
    split_mailboxes(&value)
        .into_iter()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|mailbox| match mailbox.rsplit_once('<') {
            Some((name, addr)) if !name.is_ascii() => {
                let name = name.trim().trim_matches('"').trim();
                format!("{} <{addr}", encoded_word(name))
            }
            _ => mailbox.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split on commas that are not inside a quoted display name.
fn split_mailboxes(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Sends mail as the authenticated user.
pub struct GmailExecutor {
    tokens: Arc<dyn TokenProvider>,
    client: reqwest::Client,
    base_url: String,
}

impl GmailExecutor {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(tokens, GMAIL_BASE_URL)
    }

    /// Point the executor at a different API host (tests, proxies).
    pub fn with_base_url(tokens: Arc<dyn TokenProvider>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            tokens,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn try_send(&self, user_id: &str, email: &NewEmail) -> Result<Value> {
        let token = self
            .tokens
            .authorized_token(user_id)
            .await?
            .ok_or_else(|| AdapterError::MissingCredentials {
                user_id: user_id.to_string(),
            })?;

        let profile = read_json(
            self.client
                .get(format!("{}/gmail/v1/users/me/profile", self.base_url))
                .bearer_auth(&token)
                .send()
                .await,
            "gmail profile",
        )
        .await?;
        let sender = required_str(&profile, "emailAddress", "gmail profile")?;

        let mime = build_mime_message(&sender, &email.recipient, &email.subject, &email.message);
        debug!(user_id = %user_id, bytes = mime.len(), "sending gmail message");

        let sent = read_json(
            self.client
                .post(format!("{}/gmail/v1/users/me/messages/send", self.base_url))
                .bearer_auth(&token)
                .json(&json!({ "raw": URL_SAFE.encode(mime.as_bytes()) }))
                .send()
                .await,
            "gmail send",
        )
        .await?;
        let message_id = required_str(&sent, "id", "gmail send")?;

        Ok(json!({
            "message_id": message_id,
            "details": {
                "to": email.recipient,
                "subject": email.subject,
                "from": sender,
            }
        }))
    }
}

#[async_trait]
impl MailSender for GmailExecutor {
    async fn send(&self, user_id: &str, email: &NewEmail) -> ExecutionResult {
        match self.try_send(user_id, email).await {
            Ok(fields) => {
                info!(user_id = %user_id, "email sent");
                ExecutionResult::ok(fields)
            }
            Err(AdapterError::MissingCredentials { .. }) => {
                ExecutionResult::failure(FailureKind::Authentication, CREDENTIALS_MISSING)
            }
            Err(e) => {
                let kind = e.failure_kind();
                warn!(user_id = %user_id, error = %e, kind = %kind, "email send failed");
                ExecutionResult::failure(kind, format!("Failed to send email: {e}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
