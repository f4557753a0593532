//! Error types for the transport crate.

use thiserror::Error;

/// Transport error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum TransportError {
    // Credential store errors
    /// Reading or writing the credential store failed.
    #[error("credential store error: {0}")]
    Store(String),

    // Serialization errors
    /// Failed to serialize or deserialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    // Link errors
    /// Opening the platform link failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The link is no longer usable.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The platform refused an outbound message.
    #[error("send rejected: {0}")]
    SendRejected(String),
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// Conversions from underlying crate errors

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
