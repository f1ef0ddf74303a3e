//! LLM client error types.

/// Errors raised while talking to a chat-completion provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request failed, or the provider answered with a non-2xx
    /// status.
    #[error("llm request failed: {reason}")]
    RequestFailed {
        /// HTTP status, when the provider answered at all.
        status: Option<u16>,
        reason: String,
    },

    /// The response body was not the expected shape.
    #[error("llm response parse error: {reason}")]
    ParseFailed { reason: String },

    /// No API key was configured.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LlmError>;
