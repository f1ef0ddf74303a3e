//! # tasklinx-llm
//!
//! Chat-completion client used by the intent interpreter.
//!
//! Talks to the **OpenAI Chat Completions API** or any endpoint that speaks
//! the same wire format (Ollama, vLLM, Together) via a base-URL override.
//! Only the non-streaming request/response path is implemented: the
//! interpreter needs one bounded JSON answer per task, nothing more.
//!
//! The [`ChatModel`] trait is the seam the rest of the workspace depends on,
//! so the interpreter can be driven by a stub in tests.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ChatModel, LlmClient, LlmClientConfig};
pub use error::{LlmError, Result};
pub use types::{ChatRequest, LlmResponse, Message, Role, Usage};
