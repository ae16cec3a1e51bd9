//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`HttpEndpointResolver`] - Endpoint lookup over HTTP using reqwest
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockEndpointResolver`] - Canned endpoint lookups

pub mod http_endpoint;
pub mod mock;

pub use http_endpoint::HttpEndpointResolver;
pub use mock::MockEndpointResolver;
