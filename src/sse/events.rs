//! SSE event types and definitions
//!
//! Contains the line classification used by the frame parser and the
//! typed [`ProgressEvent`] enum with every event the scenario stream
//! endpoint emits.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event type declaration (e.g., "event: progress")
    Event(String),
    /// Data payload (e.g., "data: {\"message\": \"hello\"}")
    Data(String),
    /// Empty line
    Empty,
    /// Comment line (starts with ':') or anything unrecognized
    Comment(String),
}

/// Frame payload errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SseParseError {
    #[error("Invalid JSON for event '{event_type}': {message}")]
    InvalidJson { event_type: String, message: String },
}

/// Typed events from the scenario stream endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A phase is starting
    PhaseStart {
        phase: String,
        index: u32,
        total: u32,
    },
    /// Free-form progress message
    Progress {
        phase: Option<String>,
        message: String,
    },
    /// Something observed while a phase runs
    Observation {
        phase: Option<String>,
        message: String,
        timestamp: Option<String>,
    },
    /// A phase finished
    PhaseEnd {
        phase: String,
        success: bool,
        duration_seconds: Option<f64>,
        error: Option<String>,
    },
    /// Server-reported failure; terminal
    Error { message: String },
    /// Run finished; payload is folded into a `TerminalResult` later
    Complete { payload: Value },
    /// Anything else; ignored by the session
    Unknown { event_type: String },
}

impl ProgressEvent {
    /// Wire name of the event.
    pub fn event_type_name(&self) -> &str {
        match self {
            ProgressEvent::PhaseStart { .. } => "phase_start",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Observation { .. } => "observation",
            ProgressEvent::PhaseEnd { .. } => "phase_end",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Unknown { event_type } => event_type,
        }
    }
}

/// Read an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Wire payloads. Every field is defaulted, and null counts as absent, so a
// sparse payload still yields an event rather than a parse error.

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PhaseStartPayload {
    #[serde(alias = "name", deserialize_with = "null_as_default")]
    pub phase: String,
    #[serde(alias = "phaseIndex", deserialize_with = "null_as_default")]
    pub index: u32,
    #[serde(alias = "totalPhases", deserialize_with = "null_as_default")]
    pub total: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct MessagePayload {
    pub phase: Option<String>,
    #[serde(
        alias = "text",
        alias = "observation",
        deserialize_with = "null_as_default"
    )]
    pub message: String,
    #[serde(alias = "occurredAt")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PhaseEndPayload {
    #[serde(alias = "name", deserialize_with = "null_as_default")]
    pub phase: String,
    #[serde(alias = "passed")]
    pub success: Option<bool>,
    #[serde(alias = "duration_seconds", alias = "duration")]
    pub duration_seconds: Option<f64>,
    pub error: Option<String>,
}
