//! Dashwire - streaming and reconnection client for run dashboards
//!
//! Two ingestion front-ends:
//! - [`websocket::StreamConnection`] keeps a WebSocket open to the live
//!   event endpoint with bounded exponential backoff and topic replay
//! - [`sse::SseReader`] streams a scenario run over Server-Sent Events and
//!   tracks it as a small session state machine
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod sse;
pub mod traits;
pub mod websocket;
