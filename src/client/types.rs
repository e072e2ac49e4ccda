//! Transport error definitions.

use thiserror::Error;

/// Errors raised by the remote client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("connection error: {0}")]
    Connect(String),

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body did not deserialize into the expected type.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request path could not be joined onto the base URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// True for failures that may succeed on another attempt.
    ///
    /// Connection errors and 5xx are retryable; 4xx, decode and URL errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Decode(_) | TransportError::InvalidUrl(_) => false,
        }
    }
}

/// Result type for remote client operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!TransportError::Status { status: 404, body: String::new() }.is_retryable());
        assert!(!TransportError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::Status { status: 500, body: "boom".into() };
        assert_eq!(err.to_string(), "upstream returned status 500: boom");
    }
}
