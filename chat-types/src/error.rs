//! Error types for duet wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding duet wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Event name not part of the live protocol
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}
