//! Response handling shared by the Google executors.

use serde_json::Value;

use crate::error::{AdapterError, Result};

/// Turn a sent request into its JSON body, or a classified error.
pub(crate) async fn read_json(
    sent: reqwest::Result<reqwest::Response>,
    operation: &'static str,
) -> Result<Value> {
    let response = sent.map_err(|source| AdapterError::Transport { operation, source })?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Http {
            operation,
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|source| AdapterError::Transport { operation, source })
}

/// Pull a required string field out of a provider response.
pub(crate) fn required_str(body: &Value, field: &str, operation: &'static str) -> Result<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdapterError::InvalidResponse {
            operation,
            reason: format!("missing `{field}`"),
        })
}
