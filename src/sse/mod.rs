//! SSE (Server-Sent Events) scenario stream ingestion
//!
//! SSE format as sent by the scenario stream endpoint:
//! - `event: <type>` - event type line (last one in a frame wins)
//! - `data: <json>` - data payload line, joined with `\n` when repeated
//! - Empty line - signals end of event
//! - Lines starting with `:` - comments (ignored)
//!
//! # Module structure
//! - `decoder` - Incremental UTF-8 decoding of network chunks
//! - `events` - Event type definitions (ProgressEvent, SseLine, SseParseError)
//! - `parser` - Frame parsing and the pure `consume_chunk` step
//! - `session` - Session state machine and log lines
//! - `reader` - HTTP request and read loop (SseReader)

mod decoder;
mod events;
mod parser;
mod reader;
mod session;

// Re-export public types
pub use decoder::Utf8Decoder;
pub use events::{ProgressEvent, SseLine, SseParseError};
pub use parser::{
    consume_chunk, parse_frame, parse_progress_event, parse_sse_line, Frame, ParserState,
};
pub use reader::{CompletionCallback, SseReader, StreamRequest};
pub use session::{
    Flow, LogLevel, LogLine, PhaseResult, PhaseSummary, ResultDefaults, SessionStatus,
    StreamSession, TerminalResult,
};
