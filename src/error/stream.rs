//! Streaming-related error types.
//!
//! Failures of a scenario stream session. The `Display` text of these
//! errors is what lands in the session's `error_message`.

use thiserror::Error;

/// Stream-specific error variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The HTTP request could not be sent.
    #[error("Stream request failed: {message}")]
    Request { message: String },

    /// Server answered with a non-success status.
    #[error("Stream request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response carried no readable body.
    #[error("Stream response has no body")]
    MissingBody,

    /// Transport failed while reading the body.
    #[error("Stream interrupted: {message}")]
    Transport { message: String },

    /// The body ended before a `complete` or `error` event arrived.
    #[error("stream ended before completion event")]
    EndedBeforeCompletion,

    /// Backend reported an error via an `error` event. Carried verbatim.
    #[error("{message}")]
    Server { message: String },
}

impl StreamError {
    /// Check if starting the stream again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Request { .. }
            | StreamError::Transport { .. }
            | StreamError::EndedBeforeCompletion => true,
            StreamError::Status { status, .. } => *status >= 500,
            StreamError::MissingBody | StreamError::Server { .. } => false,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Request { .. } => "E_STREAM_REQUEST",
            StreamError::Status { .. } => "E_STREAM_STATUS",
            StreamError::MissingBody => "E_STREAM_BODY",
            StreamError::Transport { .. } => "E_STREAM_TRANSPORT",
            StreamError::EndedBeforeCompletion => "E_STREAM_PROTOCOL",
            StreamError::Server { .. } => "E_STREAM_SERVER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        assert_eq!(
            StreamError::EndedBeforeCompletion.to_string(),
            "stream ended before completion event"
        );
        assert_eq!(
            StreamError::Status {
                status: 503,
                message: "Service Unavailable".to_string()
            }
            .to_string(),
            "Stream request failed with status 503: Service Unavailable"
        );
        assert_eq!(
            StreamError::Server {
                message: "scenario not found".to_string()
            }
            .to_string(),
            "scenario not found"
        );
    }

    #[test]
    fn test_stream_error_retryable() {
        assert!(StreamError::EndedBeforeCompletion.is_retryable());
        assert!(StreamError::Status {
            status: 502,
            message: String::new()
        }
        .is_retryable());
        assert!(!StreamError::Status {
            status: 404,
            message: String::new()
        }
        .is_retryable());
        assert!(!StreamError::Server {
            message: "boom".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            StreamError::Request { message: String::new() }.error_code(),
            StreamError::Status { status: 500, message: String::new() }.error_code(),
            StreamError::MissingBody.error_code(),
            StreamError::Transport { message: String::new() }.error_code(),
            StreamError::EndedBeforeCompletion.error_code(),
            StreamError::Server { message: String::new() }.error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
