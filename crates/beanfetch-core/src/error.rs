//! Error types for beanfetch-core.
//!
//! Per Iron Lotus Framework: All errors are explicit, no panics allowed.
//! The collection engine reacts to two classes only: transport failures,
//! which abort the current cycle, and everything else, which is absorbed
//! at the bean or attribute level.

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Error type for discovery, matching and collection.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Configuration error (load or validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection to the managed process lost or refused.
    #[error("transport error: {0}")]
    Transport(String),

    /// A bean could not be queried.
    #[error("query failed for bean {bean}: {message}")]
    Query {
        /// Bean that was being queried.
        bean: String,
        /// Failure detail from the source.
        message: String,
    },

    /// An attribute value could not be read or converted.
    #[error("attribute error: {0}")]
    Attribute(String),

    /// A raw type descriptor could not be resolved.
    #[error("classification error: {0}")]
    Classification(String),

    /// A bean name or pattern could not be parsed.
    #[error("invalid bean pattern: {0}")]
    Pattern(String),

    /// No source is attached to the instance.
    #[error("instance {0} is not connected")]
    NotConnected(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FetchError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a bean query error.
    #[must_use]
    pub fn query(bean: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Query {
            bean: bean.into(),
            message: msg.into(),
        }
    }

    /// Creates an attribute error.
    #[must_use]
    pub fn attribute(msg: impl Into<String>) -> Self {
        Self::Attribute(msg.into())
    }

    /// Creates a classification error.
    #[must_use]
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Creates a pattern error.
    #[must_use]
    pub fn pattern(msg: impl Into<String>) -> Self {
        Self::Pattern(msg.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true if this error means the connection is gone.
    ///
    /// Transport errors abort the running cycle; the caller reconnects
    /// before the next tick.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }

    /// Returns true if the error only affects a single attribute or bean.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !self.is_transport() && !matches!(self, Self::NotConnected(_))
    }
}
