//! Network-related error types.
//!
//! Errors raised while looking up the event socket endpoint.

use thiserror::Error;

/// Endpoint lookup failures.
///
/// The connection swallows all of these (logs, stays disconnected); they
/// only surface to callers that use an [`EndpointResolver`] directly.
///
/// [`EndpointResolver`]: crate::traits::EndpointResolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Connection to the lookup endpoint failed.
    #[error("Endpoint lookup failed for {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// HTTP status error (non-2xx response).
    #[error("Endpoint lookup returned status {status}")]
    HttpStatus { status: u16 },

    /// Invalid response format.
    #[error("Invalid endpoint lookup response: {message}")]
    InvalidResponse { message: String },
}

impl From<reqwest::Error> for EndpointError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return EndpointError::InvalidResponse {
                message: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return EndpointError::HttpStatus {
                status: status.as_u16(),
            };
        }
        EndpointError::ConnectionFailed {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_display() {
        assert_eq!(
            EndpointError::HttpStatus { status: 404 }.to_string(),
            "Endpoint lookup returned status 404"
        );
        assert_eq!(
            EndpointError::ConnectionFailed {
                url: "http://x/api/ws/config".to_string(),
                message: "refused".to_string()
            }
            .to_string(),
            "Endpoint lookup failed for http://x/api/ws/config: refused"
        );
    }
}
