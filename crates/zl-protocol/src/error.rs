//! Protocol error types

use thiserror::Error;

use crate::message::EnvelopeKind;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Unknown envelope kind byte
    #[error("Unknown envelope kind: {0:#04x}")]
    UnknownKind(u8),

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Incomplete frame received
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Bytes left over after a complete frame
    #[error("Trailing data after frame: {0} bytes")]
    TrailingData(usize),

    /// Header kind does not match the decoded payload
    #[error("Envelope kind mismatch: header says {header:?}, payload is {payload:?}")]
    KindMismatch {
        header: EnvelopeKind,
        payload: EnvelopeKind,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
