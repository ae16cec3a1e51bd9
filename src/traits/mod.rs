//! Trait abstractions for dependency injection and testability.
//!
//! - [`EndpointResolver`] - event socket endpoint lookup

pub mod endpoint;

pub use endpoint::{EndpointInfo, EndpointResolver};
