//! Control channel behaviour against an in-process daemon

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use zl_core::config::ControlConfig;
use zl_protocol::{
    decode_envelope, encode_envelope, Envelope, FileType, OpenViewRequest,
};
use zl_remote::{ControlChannel, ControlEndpoint, ControlError, ControlEvent};

type ServerSocket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

fn fast_settings() -> ControlConfig {
    ControlConfig {
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        ..ControlConfig::default()
    }
}

/// Accept WebSocket connections and hand them to the test
async fn spawn_daemon() -> (SocketAddr, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });
    (addr, rx)
}

type TlsServerSocket = WebSocketStream<tokio_rustls::server::TlsStream<TcpStream>>;

/// Like [`spawn_daemon`], behind TLS with a self-signed certificate for another host
async fn spawn_tls_daemon() -> (SocketAddr, mpsc::UnboundedReceiver<TlsServerSocket>) {
    use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio_rustls::rustls::{crypto::aws_lc_rs, ServerConfig};
    use tokio_rustls::TlsAcceptor;

    let _ = aws_lc_rs::default_provider().install_default();
    let cert = rcgen::generate_simple_self_signed(vec!["daemon.internal".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der()));
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.der().clone()], key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(tls) = acceptor.accept(stream).await else {
                continue;
            };
            if let Ok(ws) = tokio_tungstenite::accept_async(tls).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });
    (addr, rx)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ControlEvent>) -> ControlEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Next binary frame, skipping transport-level control frames
async fn next_binary<S>(ws: &mut WebSocketStream<S>) -> Bytes
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Binary(data))) => return data,
            Some(Ok(Message::Close(frame))) => panic!("unexpected close: {:?}", frame),
            Some(Ok(_)) => continue,
            other => panic!("socket ended: {:?}", other),
        }
    }
}

async fn send_envelope<S>(ws: &mut WebSocketStream<S>, envelope: &Envelope)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = encode_envelope(envelope).unwrap();
    ws.send(Message::Binary(frame)).await.unwrap();
}

fn open_view() -> Envelope {
    Envelope::OpenView(OpenViewRequest {
        asset_id: "a1".to_string(),
        url: "/assets/a1".to_string(),
        file_type: FileType::Image,
        title: "plot.png".to_string(),
    })
}

async fn connected(
    addr: SocketAddr,
    conns: &mut mpsc::UnboundedReceiver<ServerSocket>,
) -> (ControlChannel, mpsc::UnboundedReceiver<ControlEvent>, ServerSocket) {
    let endpoint = ControlEndpoint::new("127.0.0.1", addr.port());
    let (channel, mut events) = ControlChannel::new(endpoint, fast_settings());
    channel.connect().await.unwrap();

    let ws = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(true));
    (channel, events, ws)
}

#[tokio::test]
async fn test_ping_is_answered_once_and_not_forwarded() {
    let (addr, mut conns) = spawn_daemon().await;
    let (channel, mut events, mut ws) = connected(addr, &mut conns).await;

    send_envelope(&mut ws, &Envelope::ping(1)).await;
    let reply = decode_envelope(&next_binary(&mut ws).await).unwrap();
    assert!(matches!(reply, Envelope::Pong(_)));

    // The first event after the ping belongs to the next message
    send_envelope(&mut ws, &open_view()).await;
    assert_eq!(next_event(&mut events).await, ControlEvent::Message(open_view()));

    // Exactly one reply
    assert!(timeout(Duration::from_millis(200), next_binary(&mut ws))
        .await
        .is_err());

    channel.disconnect().await;
}

#[tokio::test]
async fn test_other_envelopes_are_forwarded_without_reply() {
    let (addr, mut conns) = spawn_daemon().await;
    let (channel, mut events, mut ws) = connected(addr, &mut conns).await;

    let custom = Envelope::Custom {
        kind: "notify".to_string(),
        payload: Bytes::from_static(b"hello"),
    };
    send_envelope(&mut ws, &custom).await;
    assert_eq!(next_event(&mut events).await, ControlEvent::Message(custom));

    send_envelope(&mut ws, &Envelope::pong(5)).await;
    assert_eq!(
        next_event(&mut events).await,
        ControlEvent::Message(Envelope::pong(5))
    );

    assert!(timeout(Duration::from_millis(200), next_binary(&mut ws))
        .await
        .is_err());

    channel.disconnect().await;
}

#[tokio::test]
async fn test_undecodable_frame_keeps_channel_open() {
    let (addr, mut conns) = spawn_daemon().await;
    let (channel, mut events, mut ws) = connected(addr, &mut conns).await;

    ws.send(Message::Binary(Bytes::from_static(b"\xFFnot a frame")))
        .await
        .unwrap();
    send_envelope(&mut ws, &open_view()).await;

    assert_eq!(next_event(&mut events).await, ControlEvent::Message(open_view()));
    assert!(channel.is_connected().await);

    channel.disconnect().await;
}

#[tokio::test]
async fn test_send_reaches_daemon() {
    let (addr, mut conns) = spawn_daemon().await;
    let (channel, _events, mut ws) = connected(addr, &mut conns).await;

    channel.send(&open_view()).await.unwrap();
    let received = decode_envelope(&next_binary(&mut ws).await).unwrap();
    assert_eq!(received, open_view());

    channel.disconnect().await;
    assert!(matches!(
        channel.send(&open_view()).await,
        Err(ControlError::NotConnected)
    ));
}

#[tokio::test]
async fn test_transport_failure_schedules_one_reconnect() {
    let (addr, mut conns) = spawn_daemon().await;
    let (channel, mut events, ws) = connected(addr, &mut conns).await;

    drop(ws);

    assert!(matches!(next_event(&mut events).await, ControlEvent::Error(_)));
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(false));

    let _second = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(true));
    assert_eq!(channel.reconnect_count(), 1);

    channel.disconnect().await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(conns.try_recv().is_err());
    assert_eq!(channel.reconnect_count(), 1);
}

#[tokio::test]
async fn test_disconnect_sends_normal_close_and_never_reconnects() {
    let (addr, mut conns) = spawn_daemon().await;
    let (channel, mut events, mut ws) = connected(addr, &mut conns).await;

    channel.disconnect().await;
    channel.disconnect().await;

    let close = loop {
        match timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Close(frame))) => break frame,
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {:?}", other),
        }
    };
    assert_eq!(close.map(|f| f.code), Some(CloseCode::Normal));
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(false));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(conns.try_recv().is_err());
    assert_eq!(channel.reconnect_count(), 0);
    assert!(!channel.is_connected().await);
}

#[tokio::test]
async fn test_unreachable_daemon_retries_until_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let endpoint = ControlEndpoint::new("127.0.0.1", port);
    let (channel, mut events) = ControlChannel::new(endpoint, fast_settings());
    channel.connect().await.unwrap();

    assert!(matches!(next_event(&mut events).await, ControlEvent::Error(_)));
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(false));
    assert!(matches!(next_event(&mut events).await, ControlEvent::Error(_)));

    channel.disconnect().await;
    let attempts = channel.reconnect_count();
    assert!(attempts >= 2);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(channel.reconnect_count(), attempts);
}

#[tokio::test]
async fn test_psk_header_is_sent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(None::<String>));

    let captured = Arc::clone(&seen);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let value = req
                .headers()
                .get("X-Zelland-PSK")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            *captured.lock().unwrap() = value;
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        while ws.next().await.is_some() {}
    });

    let endpoint =
        ControlEndpoint::new("127.0.0.1", addr.port()).with_psk(Some("s3cret".to_string()));
    let (channel, mut events) = ControlChannel::new(endpoint, fast_settings());
    channel.connect().await.unwrap();
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(true));

    assert_eq!(seen.lock().unwrap().as_deref(), Some("s3cret"));
    channel.disconnect().await;
}

#[tokio::test]
async fn test_secure_channel_accepts_self_signed_certificate() {
    let (addr, mut conns) = spawn_tls_daemon().await;
    let settings = ControlConfig {
        secure: true,
        ..fast_settings()
    };
    let endpoint = ControlEndpoint::new("127.0.0.1", addr.port());
    let (channel, mut events) = ControlChannel::new(endpoint, settings);
    channel.connect().await.unwrap();

    let mut ws = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_eq!(next_event(&mut events).await, ControlEvent::StatusChanged(true));

    send_envelope(&mut ws, &Envelope::ping(7)).await;
    let reply = decode_envelope(&next_binary(&mut ws).await).unwrap();
    assert!(matches!(reply, Envelope::Pong(_)));

    channel.disconnect().await;
}
