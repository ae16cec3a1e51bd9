//! WebSocket ingestion of live run/agent events.
//!
//! [`StreamConnection`] keeps one socket open to the server event
//! endpoint, reconnecting with bounded exponential backoff and replaying
//! topic subscriptions after every reconnect. Inbound provider messages
//! are parsed into [`RawEvent`] and normalized into canonical [`Event`]s.

pub mod client;
pub mod messages;
pub mod normalize;
pub mod state;

pub use client::{MessageHandler, StreamConnection, WsError};
pub use messages::{RawEvent, RawTimestamp, WsOutgoingMessage};
pub use normalize::{normalize, Event, RunStatus};
pub use state::{ConnectionState, ReconnectDecision, ReconnectPolicy};
