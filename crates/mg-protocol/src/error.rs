//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding protocol data
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Tunnel configuration text is missing a field the engine requires
    #[error("Malformed tunnel configuration: {0}")]
    MalformedConfig(String),

    /// Unknown frame kind
    #[error("Unknown frame kind: {0}")]
    UnknownFrameKind(u8),

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
