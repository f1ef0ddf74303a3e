//! Intent interpreter: transforms raw user text into a validated
//! [`Interpretation`].
//!
//! The language model is asked for a bare JSON object. Whatever comes back
//! is checked against a fixed shape before it can reach routing logic, and
//! every way this can go wrong is reported as a degraded interpretation
//! rather than an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::{debug, info, warn};

use tasklinx_llm::{ChatModel, ChatRequest, LlmResponse, Message};
use tasklinx_store::{ActionType, InterpretFailure, Interpretation};

/// Sampling temperature for interpretation requests.
const TEMPERATURE: f32 = 0.1;

/// Output token budget for one interpretation.
const MAX_TOKENS: u32 = 500;

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = r#"You are TaskLinx, an AI assistant that interprets natural language tasks for email and calendar operations.

Given a user's natural language input, determine:
1. The action type: "email" or "calendar"
2. Extract relevant parameters for the action

For EMAIL tasks, extract:
- recipient: email address or name
- subject: email subject line
- message: email body content

For CALENDAR tasks, extract:
- title: event title
- start_time: start date/time (convert to ISO format if possible)
- end_time: end date/time (convert to ISO format if possible, default to 1 hour after start)
- description: optional event description

If the input is neither, use "unknown" with empty parameters.

Respond ONLY with a JSON object, no prose and no code fences:
{
  "action_type": "email" or "calendar" or "unknown",
  "parameters": {
    // extracted parameters based on action type, all values are strings
  },
  "confidence": number between 0-1,
  "reasoning": "brief explanation of interpretation"
}

Examples:
Input: "Email Alice to reschedule our meeting to tomorrow at 3 PM"
Output: {
  "action_type": "email",
  "parameters": {
    "recipient": "Alice",
    "subject": "Meeting Reschedule",
    "message": "Hi Alice, I'd like to reschedule our meeting to tomorrow at 3 PM. Please let me know if this works for you."
  },
  "confidence": 0.9,
  "reasoning": "Clear email intent with recipient and rescheduling context"
}

Input: "Create a calendar event for team sync tomorrow at 2 PM"
Output: {
  "action_type": "calendar",
  "parameters": {
    "title": "Team Sync",
    "start_time": "2024-01-20T14:00:00",
    "end_time": "2024-01-20T15:00:00",
    "description": "Team synchronization meeting"
  },
  "confidence": 0.95,
  "reasoning": "Clear calendar event creation request with specific time"
}"#;

fn system_prompt(today: NaiveDate) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nToday's date is {} ({}). Resolve relative dates against it.",
        today.format("%Y-%m-%d"),
        today.format("%A"),
    )
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// Asks a language model what the user wants done.
#[derive(Clone)]
pub struct IntentInterpreter {
    model: Arc<dyn ChatModel>,
    model_name: String,
}

impl IntentInterpreter {
    /// Use the model's default model name.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            model_name: String::new(),
        }
    }

    /// Override the model name sent with each request.
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    /// Interpret `text` relative to today's local date.
    pub async fn interpret(&self, text: &str) -> Interpretation {
        self.interpret_on(text, Local::now().date_naive()).await
    }

    /// Interpret `text` relative to the given date.
    pub async fn interpret_on(&self, text: &str, today: NaiveDate) -> Interpretation {
        let mut request =
            ChatRequest::new(vec![Message::system(system_prompt(today)), Message::user(text)])
                .with_temperature(TEMPERATURE)
                .with_max_tokens(MAX_TOKENS);
        request.model = self.model_name.clone();

        debug!(chars = text.len(), "interpreting task");

        let raw = match self.model.chat(&request).await {
            Ok(LlmResponse::Text(raw)) => raw,
            Ok(LlmResponse::Refusal(reason)) => {
                warn!("model refused to interpret task");
                return unparseable(reason);
            }
            Err(e) => {
                warn!(error = %e, "llm call failed");
                return Interpretation {
                    action_type: ActionType::Error,
                    parameters: BTreeMap::new(),
                    confidence: 0.0,
                    reasoning: format!("LLM API error: {e}"),
                    raw_response: None,
                    failure: Some(InterpretFailure::LlmUnavailable),
                };
            }
        };

        let cleaned = strip_code_fence(&raw);
        let parsed: Value = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "llm answer is not json");
                return unparseable(raw);
            }
        };

        match validate_interpretation(&parsed) {
            Ok(interpretation) => {
                info!(
                    action = %interpretation.action_type,
                    confidence = interpretation.confidence,
                    "task interpreted"
                );
                interpretation
            }
            Err(reason) => {
                warn!(reason = %reason, "llm answer violates interpretation schema");
                Interpretation {
                    action_type: ActionType::Unknown,
                    parameters: BTreeMap::new(),
                    confidence: 0.0,
                    reasoning: format!("schema violation: {reason}"),
                    raw_response: Some(raw),
                    failure: Some(InterpretFailure::SchemaViolation),
                }
            }
        }
    }
}

fn unparseable(raw: String) -> Interpretation {
    Interpretation {
        action_type: ActionType::Unknown,
        parameters: BTreeMap::new(),
        confidence: 0.0,
        reasoning: "Failed to parse AI response".into(),
        raw_response: Some(raw),
        failure: Some(InterpretFailure::Unparseable),
    }
}

/// Strip an optional markdown code fence, with any info string, around
/// the answer.
fn strip_code_fence(text: &str) -> &str {
    let cleaned = text.trim();
    let Some(rest) = cleaned.strip_prefix("```") else {
        return cleaned;
    };
    let body = match rest.split_once('\n') {
        Some((info, body)) if !info.contains('{') => body,
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Check a parsed model answer against the interpretation shape.
///
/// `action_type` must be `email`, `calendar` or `unknown`. `parameters`
/// must be an object of scalars (numbers and booleans are stringified,
/// nulls dropped). `confidence` defaults to 0 and must lie in `[0, 1]`.
pub fn validate_interpretation(value: &Value) -> Result<Interpretation, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let action_type = match obj.get("action_type").and_then(Value::as_str) {
        Some("email") => ActionType::Email,
        Some("calendar") => ActionType::Calendar,
        Some("unknown") => ActionType::Unknown,
        Some(other) => return Err(format!("unsupported action_type `{other}`")),
        None => return Err("`action_type` must be a string".into()),
    };

    let mut parameters = BTreeMap::new();
    match obj.get("parameters") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, v) in map {
                let v = match v {
                    Value::Null => continue,
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(format!("parameter `{key}` must be a scalar"));
                    }
                };
                parameters.insert(key.clone(), v);
            }
        }
        Some(_) => return Err("`parameters` must be an object".into()),
    }

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 0.0,
        Some(v) => {
            let c = v
                .as_f64()
                .ok_or_else(|| "`confidence` must be a number".to_string())?;
            if !(0.0..=1.0).contains(&c) {
                return Err(format!("`confidence` {c} is outside [0, 1]"));
            }
            c
        }
    };

    let reasoning = match obj.get("reasoning") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("`reasoning` must be a string".into()),
    };

    Ok(Interpretation {
        action_type,
        parameters,
        confidence,
        reasoning,
        raw_response: None,
        failure: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
