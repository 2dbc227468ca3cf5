//! Envelope types for the control channel
//!
//! The daemon and the client exchange [`Envelope`] values. Each one is
//! serialized with bincode and wrapped in a frame (see `frame.rs`) whose
//! header repeats the envelope kind, so a reader can reject unknown kinds
//! before touching the payload.
//!
//! # Keep-alive
//!
//! The daemon sends `Ping` as soon as a client connects and periodically
//! afterwards. A client must answer every `Ping` with a `Pong` before doing
//! anything else with the message. `Pong` is an ordinary application message
//! from the receiver's point of view.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Envelope kind identifier, carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeKind {
    /// Keep-alive request
    Ping = 0x01,
    /// Keep-alive reply
    Pong = 0x02,
    /// Daemon asks the client to display an asset
    OpenView = 0x03,
    /// Client reports an annotation on a displayed asset
    Annotation = 0x04,
    /// Application-defined payload
    Custom = 0x7F,
}

impl EnvelopeKind {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Ping),
            0x02 => Some(Self::Pong),
            0x03 => Some(Self::OpenView),
            0x04 => Some(Self::Annotation),
            0x7F => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Keep-alive body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAlive {
    /// Sender's wall clock, milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl KeepAlive {
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

/// How the client should render an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Image,
    Markdown,
}

/// Request to open a view on an asset served by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenViewRequest {
    /// Daemon-assigned asset identifier
    pub asset_id: String,
    /// Path of the asset relative to the daemon root (e.g. `/assets/<id>`)
    pub url: String,
    /// Rendering hint
    pub file_type: FileType,
    /// Title shown to the user
    pub title: String,
}

/// A single annotation attached to a span of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    /// Hash of the surrounding text, used to re-anchor after edits
    pub context_hash: String,
    pub target_text: String,
    pub body: String,
    pub timestamp: u64,
}

/// Annotation sent back to the daemon for a displayed asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationAction {
    /// Asset id (or original path) the annotation belongs to
    pub file_path: String,
    pub data: Annotation,
}

/// Control-channel messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Keep-alive request
    Ping(KeepAlive),

    /// Keep-alive reply
    Pong(KeepAlive),

    /// Display an asset
    OpenView(OpenViewRequest),

    /// Annotation on a displayed asset
    Annotation(AnnotationAction),

    /// Application-defined payload, opaque to this crate
    Custom {
        /// Application-level discriminator
        kind: String,
        /// Raw payload bytes
        payload: Bytes,
    },
}

impl Envelope {
    /// Get the kind for this envelope
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Ping(_) => EnvelopeKind::Ping,
            Envelope::Pong(_) => EnvelopeKind::Pong,
            Envelope::OpenView(_) => EnvelopeKind::OpenView,
            Envelope::Annotation(_) => EnvelopeKind::Annotation,
            Envelope::Custom { .. } => EnvelopeKind::Custom,
        }
    }

    /// Build a keep-alive request
    pub fn ping(timestamp: u64) -> Self {
        Envelope::Ping(KeepAlive::new(timestamp))
    }

    /// Build a keep-alive reply
    pub fn pong(timestamp: u64) -> Self {
        Envelope::Pong(KeepAlive::new(timestamp))
    }

    /// Whether this envelope is a keep-alive request that must be answered
    pub fn is_ping(&self) -> bool {
        matches!(self, Envelope::Ping(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_roundtrip() {
        for kind in [
            EnvelopeKind::Ping,
            EnvelopeKind::Pong,
            EnvelopeKind::OpenView,
            EnvelopeKind::Annotation,
            EnvelopeKind::Custom,
        ] {
            assert_eq!(EnvelopeKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(EnvelopeKind::from_u8(0x00), None);
    }

    #[test]
    fn test_envelope_kind_matches_variant() {
        assert_eq!(Envelope::ping(1).kind(), EnvelopeKind::Ping);
        assert_eq!(Envelope::pong(1).kind(), EnvelopeKind::Pong);
        let custom = Envelope::Custom {
            kind: "notify".to_string(),
            payload: Bytes::from_static(b"{}"),
        };
        assert_eq!(custom.kind(), EnvelopeKind::Custom);
        assert!(!custom.is_ping());
        assert!(Envelope::ping(7).is_ping());
    }
}
