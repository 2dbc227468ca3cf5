//! WebSocket control channel to the companion daemon
//!
//! One long-lived binary connection to `<scheme>://<host>:<port>/ws`. Each
//! binary message carries one framed [`Envelope`]. Inbound `Ping` envelopes
//! are answered here and never reach the consumer; everything else is
//! delivered as a [`ControlEvent`].

mod channel;
mod tls;

pub use channel::ControlChannel;

use thiserror::Error;
use zl_protocol::{decode_envelope, Envelope, ProtocolError};

/// Where the daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEndpoint {
    pub host: String,
    pub port: u16,
    /// Pre-shared key sent in the configured request header
    pub psk: Option<String>,
}

impl ControlEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            psk: None,
        }
    }

    pub fn with_psk(mut self, psk: Option<String>) -> Self {
        self.psk = psk.filter(|p| !p.is_empty());
        self
    }

    /// WebSocket URL of the endpoint
    pub fn url(&self, secure: bool) -> String {
        let scheme = if secure { "wss" } else { "ws" };
        format!("{}://{}:{}/ws", scheme, self.host, self.port)
    }
}

/// Events delivered to the consumer of a [`ControlChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A non-keep-alive envelope arrived
    Message(Envelope),
    /// The connection opened (`true`) or was lost (`false`)
    StatusChanged(bool),
    /// A transport failure occurred
    Error(String),
}

/// Control channel errors
#[derive(Debug, Error)]
pub enum ControlError {
    /// No open connection to send on
    #[error("Not connected to daemon")]
    NotConnected,

    /// The endpoint or its headers could not be turned into a request
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Envelope encoding failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What to do with one inbound binary message
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// Send this envelope back and deliver nothing
    Reply(Envelope),
    /// Deliver this envelope to the consumer
    Forward(Envelope),
    /// Undecodable; already logged
    Drop,
}

/// Classify an inbound frame. `now_millis` stamps the keep-alive reply.
pub(crate) fn handle_inbound(data: &[u8], now_millis: u64) -> Inbound {
    match decode_envelope(data) {
        Ok(envelope) if envelope.is_ping() => Inbound::Reply(Envelope::pong(now_millis)),
        Ok(envelope) => Inbound::Forward(envelope),
        Err(e) => {
            tracing::warn!("Dropping undecodable control frame ({} bytes): {}", data.len(), e);
            Inbound::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zl_protocol::encode_envelope;

    #[test]
    fn test_ping_is_answered() {
        let frame = encode_envelope(&Envelope::ping(10)).unwrap();
        assert_eq!(handle_inbound(&frame, 42), Inbound::Reply(Envelope::pong(42)));
    }

    #[test]
    fn test_other_envelopes_are_forwarded() {
        let frame = encode_envelope(&Envelope::pong(10)).unwrap();
        assert_eq!(handle_inbound(&frame, 42), Inbound::Forward(Envelope::pong(10)));
    }

    #[test]
    fn test_garbage_is_dropped() {
        assert_eq!(handle_inbound(b"\x01\x00", 42), Inbound::Drop);
        assert_eq!(handle_inbound(b"", 42), Inbound::Drop);
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = ControlEndpoint::new("devbox", 8083).with_psk(Some(String::new()));
        assert_eq!(endpoint.url(false), "ws://devbox:8083/ws");
        assert_eq!(endpoint.url(true), "wss://devbox:8083/ws");
        assert!(endpoint.psk.is_none());
    }
}
