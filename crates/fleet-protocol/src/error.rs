//! Error types for the membership protocol.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Covers malformed datagrams as well as event kinds this build does
    /// not know about.
    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("encoded message is {size} bytes, exceeds the {max} byte datagram limit")]
    Oversized { size: usize, max: usize },

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
