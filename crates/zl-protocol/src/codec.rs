//! Tokio codec for framed envelopes

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::message::Envelope;

/// Codec for encoding/decoding envelope frames
#[derive(Debug, Default)]
pub struct EnvelopeCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
}

impl EnvelopeCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None), // Need more data
            },
        };

        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < payload_len {
            self.pending_header = Some(header);
            return Ok(None);
        }

        let payload_bytes = src.split_to(payload_len).freeze();
        let envelope: Envelope = bincode::deserialize(&payload_bytes)?;

        if envelope.kind() != header.kind {
            return Err(ProtocolError::KindMismatch {
                header: header.kind,
                payload: envelope.kind(),
            });
        }

        Ok(Some(envelope))
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, envelope: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::serialize(&envelope)?;
        let payload_len = payload.len();

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        FrameHeader::new(envelope.kind(), payload_len as u32).encode(dst);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}

/// Encode one envelope into a standalone frame (one WebSocket message)
pub fn encode_envelope(envelope: &Envelope) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    EnvelopeCodec::new().encode(envelope.clone(), &mut buf)?;
    Ok(buf.freeze())
}

/// Decode a standalone frame that must contain exactly one envelope
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, ProtocolError> {
    let mut buf = BytesMut::from(data);
    let mut codec = EnvelopeCodec::new();

    let envelope = match codec.decode(&mut buf)? {
        Some(envelope) => envelope,
        None => {
            let expected = codec
                .pending_header
                .map(|h| HEADER_SIZE + h.payload_length as usize)
                .unwrap_or(HEADER_SIZE);
            return Err(ProtocolError::IncompleteFrame {
                expected,
                actual: data.len(),
            });
        }
    };

    if !buf.is_empty() {
        return Err(ProtocolError::TrailingData(buf.len()));
    }

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FileType, OpenViewRequest};

    #[test]
    fn test_codec_open_view() {
        let mut codec = EnvelopeCodec::new();
        let envelope = Envelope::OpenView(OpenViewRequest {
            asset_id: "a1b2".to_string(),
            url: "/assets/a1b2".to_string(),
            file_type: FileType::Markdown,
            title: "notes.md".to_string(),
        });

        let mut buf = BytesMut::new();
        codec.encode(envelope.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, envelope);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = EnvelopeCodec::new();

        let mut full_buf = BytesMut::new();
        codec.encode(Envelope::ping(12345), &mut full_buf).unwrap();

        let mut partial = full_buf.split_to(HEADER_SIZE + 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full_buf);

        match codec.decode(&mut partial).unwrap().unwrap() {
            Envelope::Ping(keep_alive) => assert_eq!(keep_alive.timestamp, 12345),
            other => panic!("Expected Ping, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_kind_mismatch() {
        let mut frame = BytesMut::from(&encode_envelope(&Envelope::ping(1)).unwrap()[..]);
        frame[0] = crate::message::EnvelopeKind::Pong.as_u8();

        let result = decode_envelope(&frame);
        assert!(matches!(result, Err(ProtocolError::KindMismatch { .. })));
    }

    #[test]
    fn test_decode_envelope_incomplete() {
        let frame = encode_envelope(&Envelope::pong(99)).unwrap();
        let result = decode_envelope(&frame[..frame.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::IncompleteFrame { .. })));
    }

    #[test]
    fn test_decode_envelope_trailing_data() {
        let mut frame = encode_envelope(&Envelope::pong(99)).unwrap().to_vec();
        frame.push(0);
        assert!(matches!(
            decode_envelope(&frame),
            Err(ProtocolError::TrailingData(1))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_envelope(b"\xFFgarbage").is_err());
        assert!(decode_envelope(b"").is_err());
    }
}
