//! Gateway error types.

use thiserror::Error;

/// Errors raised by a [`Gateway`](crate::Gateway) implementation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway connection is not established.
    #[error("gateway is not connected")]
    NotConnected,

    /// The platform rejected or failed to deliver an outbound message.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The gateway does not implement this operation.
    #[error("operation '{operation}' is not supported by this gateway")]
    Unsupported {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The platform did not answer in time.
    #[error("gateway call timed out")]
    Timeout,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
