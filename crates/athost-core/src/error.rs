//! Transport-level error types.

use thiserror::Error;

/// Errors reported by a [`crate::SerialPort`] implementation.
#[derive(Debug, Error)]
pub enum PortError {
    /// No byte arrived within the per-byte timeout.
    #[error("timed out waiting for serial data")]
    Timeout,

    /// The peer closed the connection.
    #[error("serial port closed")]
    Closed,

    /// An underlying I/O error.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortError {
    /// Check whether this error is a per-byte timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PortError::Timeout)
    }
}

/// Result type alias for transport operations.
pub type PortResult<T> = Result<T, PortError>;
