//! Sink error types.

/// Result type alias for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

/// Sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Output could not be written.
    #[error("write error: {0}")]
    Write(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Creates a write error.
    #[must_use]
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}
