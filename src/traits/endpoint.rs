//! Event socket endpoint lookup.
//!
//! The socket URL is not known up front: the backend publishes it (and
//! whether the socket is enabled at all) through a lookup call. This
//! trait abstracts that call so the connection can be driven against an
//! in-memory resolver in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EndpointError;

/// Result of an endpoint lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// Whether the server has the event socket turned on
    pub enabled: bool,
    /// Socket URL (`ws://` or `wss://`)
    #[serde(default)]
    pub url: String,
}

impl EndpointInfo {
    pub fn enabled(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            url: String::new(),
        }
    }

    /// Enabled and carrying a non-empty URL.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }
}

/// Trait for looking up the event socket endpoint.
///
/// # Example
///
/// ```ignore
/// use dashwire::traits::EndpointResolver;
///
/// async fn socket_url<R: EndpointResolver>(resolver: &R) -> Option<String> {
///     let info = resolver.resolve().await.ok()?;
///     info.is_usable().then_some(info.url)
/// }
/// ```
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Perform one lookup. Callers cache the result themselves.
    async fn resolve(&self) -> Result<EndpointInfo, EndpointError>;
}
