//! zl-protocol: Control-channel wire protocol for Zelland
//!
//! This crate defines the binary envelope exchanged between a client and
//! the companion daemon over the upgraded `/ws` connection. Every binary
//! WebSocket message carries exactly one length-delimited frame.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{decode_envelope, encode_envelope, EnvelopeCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{
    Annotation, AnnotationAction, Envelope, EnvelopeKind, FileType, KeepAlive, OpenViewRequest,
};
