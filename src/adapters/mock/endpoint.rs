//! In-memory endpoint resolver for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::EndpointError;
use crate::traits::{EndpointInfo, EndpointResolver};

/// Mock endpoint resolver.
///
/// Returns a configurable response and counts how often it was asked,
/// which is how tests observe URL caching.
///
/// ```ignore
/// let resolver = MockEndpointResolver::enabled("ws://127.0.0.1:9000/ws");
/// let conn = StreamConnection::new(Arc::new(resolver.clone()), &config);
/// conn.connect();
/// assert_eq!(resolver.calls(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockEndpointResolver {
    response: Arc<Mutex<Result<EndpointInfo, EndpointError>>>,
    calls: Arc<AtomicUsize>,
}

impl MockEndpointResolver {
    pub fn new(response: Result<EndpointInfo, EndpointError>) -> Self {
        Self {
            response: Arc::new(Mutex::new(response)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Resolver reporting an enabled socket at `url`.
    pub fn enabled(url: impl Into<String>) -> Self {
        Self::new(Ok(EndpointInfo::enabled(url)))
    }

    /// Resolver reporting the socket as disabled by server configuration.
    pub fn disabled() -> Self {
        Self::new(Ok(EndpointInfo::disabled()))
    }

    /// Resolver whose lookup always fails.
    pub fn failing(error: EndpointError) -> Self {
        Self::new(Err(error))
    }

    /// Change what subsequent lookups return.
    pub fn set_response(&self, response: Result<EndpointInfo, EndpointError>) {
        if let Ok(mut guard) = self.response.lock() {
            *guard = response;
        }
    }

    /// Number of lookups performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointResolver for MockEndpointResolver {
    async fn resolve(&self) -> Result<EndpointInfo, EndpointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.response.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Err(EndpointError::InvalidResponse {
                message: "mock resolver poisoned".to_string(),
            }),
        }
    }
}
