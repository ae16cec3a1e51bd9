//! Error types shared across the crate.
//!
//! - [`StreamError`]: scenario stream failures, rendered into session state
//! - [`EndpointError`]: socket endpoint lookup failures
//!
//! Transport errors of the socket live next to the client in
//! [`crate::websocket::WsError`]; frame payload errors live in
//! [`crate::sse::SseParseError`].

mod network;
mod stream;

pub use network::EndpointError;
pub use stream::StreamError;
