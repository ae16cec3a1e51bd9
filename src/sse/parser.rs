//! SSE stream parsing logic
//!
//! Bytes go through a stateful UTF-8 decoder into a text buffer; the
//! buffer is cut at every blank line and each cut-off frame is parsed on
//! its own. [`consume_chunk`] is a pure step over [`ParserState`] so any
//! chunking of the same byte stream yields the same events.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::decoder::Utf8Decoder;
use super::events::{
    MessagePayload, PhaseEndPayload, PhaseStartPayload, ProgressEvent, SseLine, SseParseError,
};

const FRAME_DELIMITER: &str = "\n\n";

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(rest.trim().to_string());
    }

    // Unknown line format - treat as comment
    SseLine::Comment(line.to_string())
}

/// One blank-line-delimited record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Last `event:` value seen, if any
    pub event: Option<String>,
    /// All `data:` values joined with `\n`
    pub data: String,
}

/// Split a frame block (without its terminating blank line) into parts.
pub fn parse_frame(block: &str) -> Frame {
    let mut event = None;
    let mut data: Vec<String> = Vec::new();

    for line in block.lines() {
        match parse_sse_line(line) {
            SseLine::Event(name) => event = Some(name),
            SseLine::Data(chunk) => data.push(chunk),
            SseLine::Empty | SseLine::Comment(_) => {}
        }
    }

    Frame {
        event,
        data: data.join("\n"),
    }
}

/// Parse SSE event type and data into a typed event.
///
/// Unrecognized event types are returned as `Unknown` without looking at
/// their data. Empty data counts as an empty JSON object.
pub fn parse_progress_event(event_type: &str, data: &str) -> Result<ProgressEvent, SseParseError> {
    if !matches!(
        event_type,
        "phase_start" | "progress" | "observation" | "phase_end" | "error" | "complete"
    ) {
        return Ok(ProgressEvent::Unknown {
            event_type: event_type.to_string(),
        });
    }

    let data = if data.trim().is_empty() { "{}" } else { data };
    let value: Value = serde_json::from_str(data).map_err(|e| SseParseError::InvalidJson {
        event_type: event_type.to_string(),
        message: e.to_string(),
    })?;

    let event = match event_type {
        "phase_start" => {
            let p: PhaseStartPayload = payload(event_type, value)?;
            ProgressEvent::PhaseStart {
                phase: p.phase,
                index: p.index,
                total: p.total,
            }
        }
        "progress" => {
            let p: MessagePayload = payload(event_type, value)?;
            ProgressEvent::Progress {
                phase: p.phase,
                message: p.message,
            }
        }
        "observation" => {
            let p: MessagePayload = payload(event_type, value)?;
            ProgressEvent::Observation {
                phase: p.phase,
                message: p.message,
                timestamp: p.timestamp,
            }
        }
        "phase_end" => {
            let p: PhaseEndPayload = payload(event_type, value)?;
            ProgressEvent::PhaseEnd {
                success: p.success.unwrap_or(p.error.is_none()),
                phase: p.phase,
                duration_seconds: p.duration_seconds,
                error: p.error,
            }
        }
        "error" => ProgressEvent::Error {
            message: error_message(&value),
        },
        _ => ProgressEvent::Complete { payload: value },
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(event_type: &str, value: Value) -> Result<T, SseParseError> {
    serde_json::from_value(value).map_err(|e| SseParseError::InvalidJson {
        event_type: event_type.to_string(),
        message: e.to_string(),
    })
}

/// Server error text, tolerant of the shapes backends actually send.
fn error_message(value: &Value) -> String {
    ["message", "error", "detail"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .or_else(|| value.as_str())
        .unwrap_or("Unknown error")
        .to_string()
}

/// Decoder state plus unterminated text carried between reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    decoder: Utf8Decoder,
    buffer: String,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// End of stream: flush the decoder and hand back whatever text never
    /// formed a complete frame.
    pub fn finish(mut self) -> String {
        let dangling = self.decoder.pending_len();
        if dangling > 0 {
            debug!("Stream ended inside a {}-byte partial character", dangling);
        }
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        self.buffer
    }
}

/// Advance the parser by one chunk of bytes.
///
/// Returns the updated state and every event completed by this chunk, in
/// stream order. Frames without an `event:` line and frames whose data is
/// not valid JSON are dropped.
pub fn consume_chunk(mut state: ParserState, bytes: &[u8]) -> (ParserState, Vec<ProgressEvent>) {
    let text = state.decoder.decode(bytes);
    // CR is dropped so CRLF framing delimits the same way as LF
    state.buffer.extend(text.chars().filter(|c| *c != '\r'));

    let mut events = Vec::new();
    while let Some(end) = state.buffer.find(FRAME_DELIMITER) {
        let block: String = state.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
        let frame = parse_frame(&block[..end]);

        let Some(event_type) = frame.event else {
            debug!("Ignoring SSE frame without event name");
            continue;
        };

        match parse_progress_event(&event_type, &frame.data) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Dropping SSE frame: {}", e),
        }
    }

    (state, events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(chunks: &[&[u8]]) -> Vec<ProgressEvent> {
        let mut state = ParserState::new();
        let mut out = Vec::new();
        for chunk in chunks {
            let (next, events) = consume_chunk(state, chunk);
            state = next;
            out.extend(events);
        }
        out
    }

    const SAMPLE_STREAM: &str = concat!(
        ": connected\n\n",
        "event: phase_start\ndata: {\"phase\":\"unit\",\"index\":1,\"total\":3}\n\n",
        "event: progress\ndata: {\"message\":\"compilé ✓ 🚀\"}\n\n",
        "data: {\"message\":\"no event name\"}\n\n",
        "event: observation\ndata: {\"message\":\"slow test\",\n",
        "data: \"timestamp\":\"2024-05-01T10:00:00Z\"}\n\n",
        "event: phase_end\ndata: {\"phase\":\"unit\",\"durationSeconds\":4.5}\n\n",
        "event: complete\ndata: {\"success\":true}\n\n",
    );

    // Tests for parse_sse_line

    #[test]
    fn test_parse_sse_lines() {
        assert_eq!(parse_sse_line(""), SseLine::Empty);
        assert_eq!(
            parse_sse_line(": keep-alive"),
            SseLine::Comment("keep-alive".to_string())
        );
        assert_eq!(
            parse_sse_line("event:phase_start"),
            SseLine::Event("phase_start".to_string())
        );
        assert_eq!(
            parse_sse_line("data: {\"x\":1}"),
            SseLine::Data("{\"x\":1}".to_string())
        );
        assert_eq!(
            parse_sse_line("retry: 100"),
            SseLine::Comment("retry: 100".to_string())
        );
    }

    // Tests for parse_frame

    #[test]
    fn test_frame_last_event_wins_and_data_joined() {
        let frame = parse_frame("event: progress\nevent: observation\ndata: {\"a\":\ndata: 1}");
        assert_eq!(frame.event.as_deref(), Some("observation"));
        assert_eq!(frame.data, "{\"a\":\n1}");
    }

    // Tests for parse_progress_event

    #[test]
    fn test_phase_start_example() {
        let events = parse_all(&[
            b"event: phase_start\ndata: {\"phase\":\"unit\",\"index\":1,\"total\":3}\n\n",
        ]);
        assert_eq!(
            events,
            vec![ProgressEvent::PhaseStart {
                phase: "unit".to_string(),
                index: 1,
                total: 3
            }]
        );
    }

    #[test]
    fn test_null_fields_read_as_missing() {
        let start =
            parse_progress_event("phase_start", r#"{"phase":null,"index":null,"total":2}"#).unwrap();
        assert_eq!(
            start,
            ProgressEvent::PhaseStart {
                phase: String::new(),
                index: 0,
                total: 2
            }
        );

        let end = parse_progress_event(
            "phase_end",
            r#"{"phase":null,"success":null,"durationSeconds":null,"error":null}"#,
        )
        .unwrap();
        assert!(matches!(
            end,
            ProgressEvent::PhaseEnd { ref phase, success: true, duration_seconds: None, error: None }
                if phase.is_empty()
        ));

        let progress =
            parse_progress_event("progress", r#"{"phase":"unit","message":null}"#).unwrap();
        assert_eq!(
            progress,
            ProgressEvent::Progress {
                phase: Some("unit".to_string()),
                message: String::new()
            }
        );
    }

    #[test]
    fn test_phase_end_success_inferred_from_error() {
        let ok = parse_progress_event("phase_end", r#"{"phase":"lint","duration":2}"#).unwrap();
        assert!(matches!(ok, ProgressEvent::PhaseEnd { success: true, .. }));

        let failed = parse_progress_event(
            "phase_end",
            r#"{"phase":"lint","durationSeconds":2,"error":"3 warnings"}"#,
        )
        .unwrap();
        match failed {
            ProgressEvent::PhaseEnd {
                success,
                duration_seconds,
                error,
                ..
            } => {
                assert!(!success);
                assert_eq!(duration_seconds, Some(2.0));
                assert_eq!(error.as_deref(), Some("3 warnings"));
            }
            other => panic!("Expected PhaseEnd, got {:?}", other),
        }
    }

    #[test]
    fn test_error_event_shapes() {
        for data in [
            r#"{"message":"boom"}"#,
            r#"{"error":"boom"}"#,
            r#""boom""#,
        ] {
            assert_eq!(
                parse_progress_event("error", data).unwrap(),
                ProgressEvent::Error {
                    message: "boom".to_string()
                }
            );
        }
        assert_eq!(
            parse_progress_event("error", "").unwrap(),
            ProgressEvent::Error {
                message: "Unknown error".to_string()
            }
        );
    }

    #[test]
    fn test_complete_without_data() {
        assert_eq!(
            parse_progress_event("complete", "").unwrap(),
            ProgressEvent::Complete {
                payload: serde_json::json!({})
            }
        );
    }

    #[test]
    fn test_unknown_event_ignores_data() {
        assert_eq!(
            parse_progress_event("heartbeat", "not json").unwrap(),
            ProgressEvent::Unknown {
                event_type: "heartbeat".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_json() {
        let result = parse_progress_event("progress", "{nope");
        assert!(matches!(result, Err(SseParseError::InvalidJson { .. })));
    }

    // Tests for consume_chunk

    #[test]
    fn test_realistic_stream() {
        let events = parse_all(&[SAMPLE_STREAM.as_bytes()]);
        let names: Vec<&str> = events.iter().map(|e| e.event_type_name()).collect();
        assert_eq!(
            names,
            vec!["phase_start", "progress", "observation", "phase_end", "complete"]
        );
        assert_eq!(
            events[1],
            ProgressEvent::Progress {
                phase: None,
                message: "compilé ✓ 🚀".to_string()
            }
        );
        assert_eq!(
            events[2],
            ProgressEvent::Observation {
                phase: None,
                message: "slow test".to_string(),
                timestamp: Some("2024-05-01T10:00:00Z".to_string())
            }
        );
    }

    #[test]
    fn test_every_split_point_yields_same_events() {
        let bytes = SAMPLE_STREAM.as_bytes();
        let expected = parse_all(&[bytes]);

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(parse_all(&[a, b]), expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_yields_same_events() {
        let bytes = SAMPLE_STREAM.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(parse_all(&chunks), parse_all(&[bytes]));
    }

    #[test]
    fn test_unterminated_frame_is_retained() {
        let (state, events) = consume_chunk(ParserState::new(), b"event: progress\ndata: {}");
        assert!(events.is_empty());
        assert_eq!(state.clone().finish(), "event: progress\ndata: {}");

        let (state, events) = consume_chunk(state, b"\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(state.finish(), "");
    }

    #[test]
    fn test_finish_returns_unterminated_text() {
        let (state, events) = consume_chunk(
            ParserState::new(),
            b"event: progress\ndata: {\"message\":\"caf\xC3",
        );
        assert!(events.is_empty());
        assert_eq!(state.finish(), "event: progress\ndata: {\"message\":\"caf\u{FFFD}");

        let (state, _) = consume_chunk(ParserState::new(), b"event: complete\ndata: {}\n\n");
        assert_eq!(state.finish(), "");
    }

    #[test]
    fn test_crlf_framing() {
        let events = parse_all(&[b"event: progress\r\ndata: {\"message\":\"hi\"}\r\n\r\n"]);
        assert_eq!(
            events,
            vec![ProgressEvent::Progress {
                phase: None,
                message: "hi".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_frame_does_not_block_later_frames() {
        let events = parse_all(&[
            b"event: progress\ndata: {broken\n\nevent: progress\ndata: {\"message\":\"ok\"}\n\n",
        ]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ProgressEvent::Progress { message, .. } if message == "ok"));
    }
}
