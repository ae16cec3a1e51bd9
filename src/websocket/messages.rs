use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::client::WsError;

/// Discriminant fields checked in order on every inbound frame.
const DISCRIMINANT_FIELDS: [&str; 2] = ["type", "eventType"];

/// Kind reported for objects that carry no discriminant at all.
pub const UNTYPED_KIND: &str = "unknown";

/// Timestamp spellings, highest precedence first.
pub const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "occurredAt", "occurred_at"];

/// Spellings serde accepts for the same field, highest precedence first.
///
/// Only the first one present in a frame is handed to serde, so a frame
/// carrying two spellings still decodes instead of failing as a duplicate.
const FIELD_SPELLINGS: [&[&str]; 9] = [
    &["runId", "run_id"],
    &["agentId", "agent_id"],
    &["status", "state"],
    &["activity", "tool"],
    &["seq", "sequence"],
    &["text", "output", "chunk"],
    &["exitCode", "exit_code"],
    &["durationMs", "duration_ms"],
    &TIMESTAMP_FIELDS,
];

/// Timestamp as providers send it: epoch millis or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Run status change
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRunStatus {
    #[serde(alias = "run_id")]
    pub run_id: String,
    #[serde(alias = "state")]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "occurredAt", alias = "occurred_at")]
    pub timestamp: Option<RawTimestamp>,
}

/// Agent status change
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAgentStatus {
    #[serde(alias = "agent_id")]
    pub agent_id: String,
    #[serde(default, alias = "run_id")]
    pub run_id: Option<String>,
    #[serde(alias = "state")]
    pub status: String,
    #[serde(default, alias = "tool")]
    pub activity: Option<String>,
    #[serde(default, alias = "occurredAt", alias = "occurred_at")]
    pub timestamp: Option<RawTimestamp>,
}

/// One chunk of streamed run output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRunOutput {
    #[serde(alias = "run_id")]
    pub run_id: String,
    #[serde(default, alias = "sequence")]
    pub seq: u64,
    #[serde(default = "default_output_stream")]
    pub stream: String,
    #[serde(alias = "output", alias = "chunk")]
    pub text: String,
    #[serde(default, alias = "occurredAt", alias = "occurred_at")]
    pub timestamp: Option<RawTimestamp>,
}

fn default_output_stream() -> String {
    "stdout".to_string()
}

/// Run finished (successfully or not)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRunCompleted {
    #[serde(alias = "run_id")]
    pub run_id: String,
    #[serde(default = "default_completed_status", alias = "state")]
    pub status: String,
    #[serde(default, alias = "exit_code")]
    pub exit_code: Option<i64>,
    #[serde(default, alias = "duration_ms")]
    pub duration_ms: Option<u64>,
    #[serde(default, alias = "occurredAt", alias = "occurred_at")]
    pub timestamp: Option<RawTimestamp>,
}

fn default_completed_status() -> String {
    "complete".to_string()
}

/// Inbound provider message, one variant per recognized discriminant.
///
/// Anything not recognized, including a recognized discriminant whose
/// fields do not match the expected shape, lands in `Unknown` with its
/// kind and payload untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    RunStatus(RawRunStatus),
    AgentStatus(RawAgentStatus),
    RunOutput(RawRunOutput),
    RunCompleted(RawRunCompleted),
    Unknown {
        kind: String,
        payload: Map<String, Value>,
    },
}

impl RawEvent {
    /// Parse one text frame.
    ///
    /// Fails only when the frame is not a JSON object.
    pub fn parse(text: &str) -> Result<Self, WsError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| WsError::ParseError(e.to_string()))?;
        let Value::Object(payload) = value else {
            return Err(WsError::ParseError("expected a JSON object".to_string()));
        };
        Ok(Self::from_object(payload))
    }

    /// Build from an already-decoded JSON object.
    pub fn from_object(payload: Map<String, Value>) -> Self {
        let kind = DISCRIMINANT_FIELDS
            .iter()
            .find_map(|field| payload.get(*field).and_then(Value::as_str))
            .unwrap_or(UNTYPED_KIND)
            .to_string();

        let parsed = match kind.as_str() {
            "run_status" | "run.status" | "RunStatusChanged" => {
                decode(&payload).map(RawEvent::RunStatus)
            }
            "agent_status" | "agent.status" | "AgentStatusChanged" => {
                decode(&payload).map(RawEvent::AgentStatus)
            }
            "run_output" | "run.output" | "RunOutputChunk" => {
                decode(&payload).map(RawEvent::RunOutput)
            }
            "run_completed" | "run.completed" | "RunCompleted" => {
                decode(&payload).map(RawEvent::RunCompleted)
            }
            _ => None,
        };

        match parsed {
            Some(event) => event,
            None => RawEvent::Unknown { kind, payload },
        }
    }

    /// Discriminant this event maps to on the canonical side.
    pub fn kind(&self) -> &str {
        match self {
            RawEvent::RunStatus(_) => "run_status",
            RawEvent::AgentStatus(_) => "agent_status",
            RawEvent::RunOutput(_) => "run_output",
            RawEvent::RunCompleted(_) => "run_completed",
            RawEvent::Unknown { kind, .. } => kind,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: &Map<String, Value>) -> Option<T> {
    let mut fields = payload.clone();
    for spellings in FIELD_SPELLINGS {
        if let Some(winner) = spellings.iter().position(|key| fields.contains_key(*key)) {
            for key in &spellings[winner + 1..] {
                fields.remove(*key);
            }
        }
    }
    match serde_json::from_value(Value::Object(fields)) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Passing through event with unexpected shape: {}", e);
            None
        }
    }
}

/// Outgoing control frames (sent to server)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoingMessage {
    Subscribe {
        #[serde(rename = "runIds")]
        run_ids: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_status_by_type() {
        let raw = RawEvent::parse(r#"{"type":"run_status","runId":"r1","status":"QUEUED"}"#)
            .unwrap();
        match raw {
            RawEvent::RunStatus(s) => {
                assert_eq!(s.run_id, "r1");
                assert_eq!(s.status, "QUEUED");
                assert!(s.timestamp.is_none());
            }
            other => panic!("Expected RunStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_uses_event_type_fallback() {
        let raw = RawEvent::parse(
            r#"{"eventType":"RunOutputChunk","run_id":"r2","sequence":7,"output":"ok\n"}"#,
        )
        .unwrap();
        match raw {
            RawEvent::RunOutput(o) => {
                assert_eq!(o.run_id, "r2");
                assert_eq!(o.seq, 7);
                assert_eq!(o.stream, "stdout");
                assert_eq!(o.text, "ok\n");
            }
            other => panic!("Expected RunOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_type_wins_over_event_type() {
        let raw = RawEvent::parse(r#"{"type":"heartbeat","eventType":"run_status"}"#).unwrap();
        assert_eq!(raw.kind(), "heartbeat");
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let raw = RawEvent::parse(r#"{"type":"heartbeat","n":1}"#).unwrap();
        match raw {
            RawEvent::Unknown { kind, payload } => {
                assert_eq!(kind, "heartbeat");
                assert_eq!(payload["n"], 1);
            }
            other => panic!("Expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_known_kind_with_bad_shape_passes_through() {
        let raw = RawEvent::parse(r#"{"type":"run_status","status":"running"}"#).unwrap();
        assert!(matches!(raw, RawEvent::Unknown { ref kind, .. } if kind == "run_status"));
    }

    #[test]
    fn test_missing_discriminant() {
        let raw = RawEvent::parse(r#"{"hello":"world"}"#).unwrap();
        assert_eq!(raw.kind(), UNTYPED_KIND);
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(matches!(
            RawEvent::parse("not json"),
            Err(WsError::ParseError(_))
        ));
        assert!(matches!(RawEvent::parse("[1,2]"), Err(WsError::ParseError(_))));
    }

    #[test]
    fn test_message_id_does_not_clash_with_run_id() {
        let raw = RawEvent::parse(
            r#"{"type":"run_status","id":"evt-1","runId":"r1","status":"queued"}"#,
        )
        .unwrap();
        match raw {
            RawEvent::RunStatus(s) => {
                assert_eq!(s.run_id, "r1");
                assert_eq!(s.status, "queued");
            }
            other => panic!("Expected RunStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_wins_over_occurred_at() {
        let raw = RawEvent::parse(
            r#"{"type":"run_status","runId":"r1","status":"cancelled","timestamp":1000,"occurredAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        match raw {
            RawEvent::RunStatus(s) => {
                assert_eq!(s.status, "cancelled");
                assert_eq!(s.timestamp, Some(RawTimestamp::Millis(1000)));
            }
            other => panic!("Expected RunStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_both_spellings_of_a_field_still_decode() {
        let raw = RawEvent::parse(
            r#"{"type":"run_output","runId":"r1","run_id":"stale","seq":3,"sequence":9,"text":"a","output":"b"}"#,
        )
        .unwrap();
        match raw {
            RawEvent::RunOutput(o) => {
                assert_eq!(o.run_id, "r1");
                assert_eq!(o.seq, 3);
                assert_eq!(o.text, "a");
            }
            other => panic!("Expected RunOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_serialization() {
        let msg = WsOutgoingMessage::Subscribe {
            run_ids: vec!["a".to_string(), "b".to_string()],
        };
        let json: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "subscribe", "runIds": ["a", "b"]}));
    }
}
