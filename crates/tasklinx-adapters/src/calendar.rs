//! Calendar executor backed by the Google Calendar REST API.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, Timelike};
use serde_json::{Value, json};
use tasklinx_auth::TokenProvider;
use tasklinx_store::{ExecutionResult, FailureKind};
use tracing::{debug, info, warn};

use crate::CREDENTIALS_MISSING;
use crate::error::{AdapterError, Result};
use crate::http::{read_json, required_str};
use crate::traits::{EventCreator, NewEvent};

/// Production Calendar API host.
pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com";

/// Hour of day used when no usable start time was given.
const DEFAULT_START_HOUR: u32 = 14;

// ---------------------------------------------------------------------------
// Event times
// ---------------------------------------------------------------------------

/// A resolved event timestamp.
///
/// Keeps whether the input carried a UTC offset so rendering reproduces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl EventTime {
    pub fn plus_hours(self, hours: i64) -> Self {
        let delta = TimeDelta::hours(hours);
        match self {
            Self::Naive(dt) => Self::Naive(dt + delta),
            Self::Offset(dt) => Self::Offset(dt + delta),
        }
    }
}

impl fmt::Display for EventTime {
    /// `YYYY-MM-DDTHH:MM:SS[.ffffff][±HH:MM]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (naive, offset) = match self {
            Self::Naive(dt) => (*dt, None),
            Self::Offset(dt) => (dt.naive_local(), Some(dt.format("%:z"))),
        };
        write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S"))?;
        let micros = naive.nanosecond() / 1_000;
        if micros != 0 {
            write!(f, ".{micros:06}")?;
        }
        if let Some(offset) = offset {
            write!(f, "{offset}")?;
        }
        Ok(())
    }
}

/// Parse a start or end time as extracted from the user's request.
///
/// Accepts ISO-8601 with a `T` separator (hour-only or longer, optional
/// fraction, optional offset or `Z`) and `YYYY-MM-DD HH:MM:SS`. Anything
/// else is `None`.
pub fn parse_event_time(raw: &str) -> Option<EventTime> {
    let raw = raw.trim();
    if raw.contains('T') {
        let raw = raw.replace('Z', "+00:00");
        parse_iso(&raw).or_else(|| expand_hour_only(&raw).as_deref().and_then(parse_iso))
    } else {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(EventTime::Naive)
    }
}

fn parse_iso(raw: &str) -> Option<EventTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(EventTime::Offset(dt));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(EventTime::Offset(dt));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(EventTime::Naive(dt));
        }
    }
    None
}

/// `2024-01-20T14` (optionally followed by an offset) as `2024-01-20T14:00`.
/// chrono will not parse a time without minutes.
fn expand_hour_only(raw: &str) -> Option<String> {
    let (date, time) = raw.split_once('T')?;
    let hour = time.get(..2)?;
    let rest = &time[2..];
    let hour_only = hour.bytes().all(|b| b.is_ascii_digit())
        && (rest.is_empty() || rest.starts_with(['+', '-']));
    hour_only.then(|| format!("{date}T{hour}:00{rest}"))
}

/// Resolve the event window.
///
/// A missing or unparseable start becomes tomorrow at 14:00 relative to
/// `now`; a missing or unparseable end becomes start plus one hour.
pub fn normalize_times(
    start: Option<&str>,
    end: Option<&str>,
    now: NaiveDateTime,
) -> (EventTime, EventTime) {
    let start = start
        .and_then(parse_event_time)
        .unwrap_or_else(|| default_start(now));
    let end = end
        .and_then(parse_event_time)
        .unwrap_or_else(|| start.plus_hours(1));
    (start, end)
}

fn default_start(now: NaiveDateTime) -> EventTime {
    let tomorrow = now.date().succ_opt().unwrap_or(now.date());
    let at = tomorrow
        .and_hms_opt(DEFAULT_START_HOUR, 0, 0)
        .unwrap_or(now);
    EventTime::Naive(at)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Creates events on the user's primary calendar.
pub struct CalendarExecutor {
    tokens: Arc<dyn TokenProvider>,
    client: reqwest::Client,
    base_url: String,
}

impl CalendarExecutor {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(tokens, CALENDAR_BASE_URL)
    }

    pub fn with_base_url(tokens: Arc<dyn TokenProvider>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            tokens,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn try_create(&self, user_id: &str, event: &NewEvent) -> Result<Value> {
        let token = self
            .tokens
            .authorized_token(user_id)
            .await?
            .ok_or_else(|| AdapterError::MissingCredentials {
                user_id: user_id.to_string(),
            })?;

        let (start, end) = normalize_times(
            event.start_time.as_deref(),
            event.end_time.as_deref(),
            Local::now().naive_local(),
        );
        let (start, end) = (start.to_string(), end.to_string());
        debug!(user_id = %user_id, start = %start, end = %end, "creating calendar event");

        let body = json!({
            "summary": event.title,
            "description": event.description,
            "start": { "dateTime": start, "timeZone": "UTC" },
            "end": { "dateTime": end, "timeZone": "UTC" },
        });

        let created = read_json(
            self.client
                .post(format!(
                    "{}/calendar/v3/calendars/primary/events",
                    self.base_url
                ))
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await,
            "calendar insert",
        )
        .await?;
        let event_id = required_str(&created, "id", "calendar insert")?;
        let event_link = created.get("htmlLink").cloned().unwrap_or(Value::Null);

        Ok(json!({
            "event_id": event_id,
            "event_link": event_link,
            "details": {
                "title": event.title,
                "start": start,
                "end": end,
                "description": event.description,
            }
        }))
    }
}

#[async_trait]
impl EventCreator for CalendarExecutor {
    async fn create(&self, user_id: &str, event: &NewEvent) -> ExecutionResult {
        match self.try_create(user_id, event).await {
            Ok(fields) => {
                info!(user_id = %user_id, "calendar event created");
                ExecutionResult::ok(fields)
            }
            Err(AdapterError::MissingCredentials { .. }) => {
                ExecutionResult::failure(FailureKind::Authentication, CREDENTIALS_MISSING)
            }
            Err(e) => {
                let kind = e.failure_kind();
                warn!(user_id = %user_id, error = %e, kind = %kind, "calendar insert failed");
                ExecutionResult::failure(kind, format!("Failed to create calendar event: {e}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
