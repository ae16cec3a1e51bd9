//! Canonical events.
//!
//! Every inbound [`RawEvent`] maps to exactly one [`Event`]. Recognized
//! kinds get a fixed payload schema with statuses run through
//! [`RunStatus::from_raw`]; unknown kinds keep their kind and payload.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::messages::{RawEvent, RawTimestamp, TIMESTAMP_FIELDS};

/// Normalized message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: String,
    pub payload: Option<Map<String, Value>>,
    pub occurred_at_ms: i64,
}

impl Event {
    /// Look up a string field of the payload.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.as_ref()?.get(field)?.as_str()
    }
}

/// Canonical run/agent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
    Timeout,
}

impl RunStatus {
    /// Map a provider status string. Unrecognized values become `Pending`.
    pub fn from_raw(raw: &str) -> Self {
        let key = raw
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == '-' || c == ' ', "_");
        match key.as_str() {
            "queued" | "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "complete" | "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" | "stopped" => RunStatus::Stopped,
            "timed_out" | "timeout" => RunStatus::Timeout,
            _ => {
                tracing::debug!("Unrecognized status {:?}, treating as pending", raw);
                RunStatus::Pending
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
            RunStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw provider event to its canonical form.
///
/// `received_at_ms` is used when the provider sent no usable timestamp.
pub fn normalize(raw: RawEvent, received_at_ms: i64) -> Event {
    match raw {
        RawEvent::RunStatus(s) => Event {
            kind: "run_status".to_string(),
            payload: object(json!({
                "runId": s.run_id,
                "status": RunStatus::from_raw(&s.status),
                "message": s.message,
            })),
            occurred_at_ms: occurred_at(s.timestamp.as_ref(), received_at_ms),
        },
        RawEvent::AgentStatus(a) => Event {
            kind: "agent_status".to_string(),
            payload: object(json!({
                "agentId": a.agent_id,
                "runId": a.run_id,
                "status": RunStatus::from_raw(&a.status),
                "activity": a.activity,
            })),
            occurred_at_ms: occurred_at(a.timestamp.as_ref(), received_at_ms),
        },
        RawEvent::RunOutput(o) => Event {
            kind: "run_output".to_string(),
            payload: object(json!({
                "runId": o.run_id,
                "seq": o.seq,
                "stream": o.stream,
                "text": o.text,
            })),
            occurred_at_ms: occurred_at(o.timestamp.as_ref(), received_at_ms),
        },
        RawEvent::RunCompleted(c) => Event {
            kind: "run_completed".to_string(),
            payload: object(json!({
                "runId": c.run_id,
                "status": RunStatus::from_raw(&c.status),
                "exitCode": c.exit_code,
                "durationMs": c.duration_ms,
            })),
            occurred_at_ms: occurred_at(c.timestamp.as_ref(), received_at_ms),
        },
        RawEvent::Unknown { kind, payload } => {
            let timestamp = TIMESTAMP_FIELDS
                .iter()
                .find_map(|field| payload.get(*field))
                .and_then(|v| serde_json::from_value::<RawTimestamp>(v.clone()).ok());
            Event {
                kind,
                occurred_at_ms: occurred_at(timestamp.as_ref(), received_at_ms),
                payload: Some(payload),
            }
        }
    }
}

fn object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn occurred_at(timestamp: Option<&RawTimestamp>, fallback: i64) -> i64 {
    match timestamp {
        Some(RawTimestamp::Millis(ms)) => *ms,
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(fallback),
        None => fallback,
    }
}
