//! Client-side session state driven by progress events.
//!
//! A [`StreamSession`] moves `idle -> streaming -> completed | error` and
//! accumulates human-readable [`LogLine`]s as events arrive. Once a
//! session reaches a terminal status every further event is ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::events::{null_as_default, ProgressEvent};
use crate::error::StreamError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Error,
}

/// One human-readable line of session output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    /// Unique within the reader; sorts in append order within a session
    pub id: String,
    pub phase_tag: Option<String>,
    pub message: String,
    pub level: LogLevel,
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhaseSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub total: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub passed: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub failed: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_seconds: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub observation_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhaseResult {
    #[serde(deserialize_with = "null_as_default")]
    pub phase: String,
    #[serde(deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_seconds: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub observation_count: u32,
    pub error: Option<String>,
}

/// Values used when a `complete` payload leaves a field out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultDefaults {
    pub scenario: String,
    pub preset: Option<String>,
}

/// Final outcome of a scenario run, built from the `complete` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalResult {
    pub success: bool,
    pub scenario: String,
    pub preset: Option<String>,
    pub phases: Vec<PhaseResult>,
    pub phase_summary: PhaseSummary,
    pub started_at: String,
    pub completed_at: String,
}

impl TerminalResult {
    /// Build a result from a `complete` payload, filling gaps from
    /// `defaults` and `now` (an RFC 3339 timestamp).
    ///
    /// Fields are read one at a time: a missing, null or unreadable field
    /// takes its default without affecting the others.
    pub fn from_payload(payload: &Value, defaults: &ResultDefaults, now: &str) -> Self {
        Self {
            success: field(payload, "success").unwrap_or(false),
            scenario: field(payload, "scenario").unwrap_or_else(|| defaults.scenario.clone()),
            preset: field(payload, "preset").or_else(|| defaults.preset.clone()),
            phases: field(payload, "phases").unwrap_or_default(),
            phase_summary: field(payload, "phaseSummary").unwrap_or_default(),
            started_at: field(payload, "startedAt").unwrap_or_else(|| now.to_string()),
            completed_at: field(payload, "completedAt").unwrap_or_else(|| now.to_string()),
        }
    }
}

fn field<T: DeserializeOwned>(payload: &Value, name: &str) -> Option<T> {
    let value = payload.get(name).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Unreadable `{}` in complete payload, using default: {}", name, e);
            None
        }
    }
}

/// What the read loop should do after applying an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    Failed,
    Completed(TerminalResult),
}

/// Observable state of one streaming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSession {
    /// Nil while idle
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub log_lines: Vec<LogLine>,
    pub result: Option<TerminalResult>,
    pub error_message: Option<String>,
    next_line: u64,
}

impl StreamSession {
    pub fn idle() -> Self {
        Self::default()
    }

    /// A fresh streaming session with no output yet.
    pub fn started(session_id: Uuid) -> Self {
        Self {
            session_id,
            status: SessionStatus::Streaming,
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one event. Events arriving after a terminal status are ignored.
    pub fn apply(&mut self, event: &ProgressEvent, defaults: &ResultDefaults) -> Flow {
        if self.status != SessionStatus::Streaming {
            return Flow::Continue;
        }

        match event {
            ProgressEvent::PhaseStart {
                phase,
                index,
                total,
            } => {
                self.push(
                    Some(phase.clone()),
                    format!("Starting phase {}/{}: {}", index, total, phase),
                    LogLevel::Info,
                    None,
                );
            }
            ProgressEvent::Progress { phase, message } => {
                self.push(phase.clone(), message.clone(), LogLevel::Info, None);
            }
            ProgressEvent::Observation {
                phase,
                message,
                timestamp,
            } => {
                self.push(
                    phase.clone(),
                    message.clone(),
                    LogLevel::Info,
                    timestamp.clone(),
                );
            }
            ProgressEvent::PhaseEnd {
                phase,
                success,
                duration_seconds,
                error,
            } => {
                let mut message = format!(
                    "Phase {} {}",
                    phase,
                    if *success { "passed" } else { "failed" }
                );
                if let Some(secs) = duration_seconds {
                    message.push_str(&format!(" in {:.1}s", secs));
                }
                let level = match error {
                    Some(err) => {
                        message.push_str(&format!(": {}", err));
                        LogLevel::Error
                    }
                    None => LogLevel::Info,
                };
                self.push(Some(phase.clone()), message, level, None);
            }
            ProgressEvent::Error { message } => {
                self.fail(&StreamError::Server {
                    message: message.clone(),
                });
                return Flow::Failed;
            }
            ProgressEvent::Complete { payload } => {
                let now = chrono::Utc::now().to_rfc3339();
                let result = TerminalResult::from_payload(payload, defaults, &now);
                self.result = Some(result.clone());
                self.status = SessionStatus::Completed;
                return Flow::Completed(result);
            }
            ProgressEvent::Unknown { .. } => {}
        }

        Flow::Continue
    }

    /// Move to `error`, recording the failure as the error message and as
    /// an error log line. No effect once terminal.
    pub fn fail(&mut self, err: &StreamError) {
        if self.is_terminal() {
            return;
        }
        let message = err.to_string();
        self.push(
            None,
            format!("Error: {}", message),
            LogLevel::Error,
            None,
        );
        self.error_message = Some(message);
        self.status = SessionStatus::Error;
    }

    fn push(
        &mut self,
        phase_tag: Option<String>,
        message: String,
        level: LogLevel,
        occurred_at: Option<String>,
    ) {
        self.next_line += 1;
        self.log_lines.push(LogLine {
            id: format!("{}-{}", self.session_id.simple(), self.next_line),
            phase_tag,
            message,
            level,
            occurred_at,
        });
    }
}
