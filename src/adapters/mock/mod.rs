//! Test doubles for the adapters.
//!
//! - [`MockEndpointResolver`] - Configurable endpoint lookup with call counting

pub mod endpoint;

pub use endpoint::MockEndpointResolver;
