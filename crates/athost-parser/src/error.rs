//! Error types for the AT parser.

use athost_core::PortError;
use thiserror::Error;

/// Errors that can occur while talking to the peripheral.
#[derive(Debug, Error)]
pub enum AtError {
    /// The transport produced no byte within the per-byte timeout.
    ///
    /// This is the only way a receive operation fails on its own: format
    /// mismatches are silently resynchronized on the next delimiter.
    #[error("timed out waiting for response")]
    Timeout,

    /// An out-of-band handler aborted the in-flight receive.
    #[error("receive aborted by out-of-band handler")]
    Aborted,

    /// The response template could not be parsed.
    #[error("invalid response template: {0}")]
    Template(String),

    /// A non-timeout transport error (write failure, closed port).
    #[error("serial transport error: {0}")]
    Port(PortError),
}

impl From<PortError> for AtError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Timeout => AtError::Timeout,
            other => AtError::Port(other),
        }
    }
}

/// Result type alias for parser operations.
pub type AtResult<T> = Result<T, AtError>;
