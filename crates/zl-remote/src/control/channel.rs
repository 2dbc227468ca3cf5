//! Control channel connection lifecycle

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use zl_core::config::ControlConfig;
use zl_core::time::current_time_millis;
use zl_protocol::{encode_envelope, Envelope};

use super::{handle_inbound, tls, ControlEndpoint, ControlError, ControlEvent, Inbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect` waits for the close handshake to be flushed
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared between the handle and its connection task
struct Shared {
    events: mpsc::UnboundedSender<ControlEvent>,
    /// Set by `disconnect` before anything else; suppresses reconnects
    closing: AtomicBool,
    /// Sender for the live connection, `None` while disconnected
    outbound: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
    reconnects: AtomicU32,
}

impl Shared {
    fn emit(&self, event: ControlEvent) {
        let _ = self.events.send(event);
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Long-lived connection to one daemon endpoint.
///
/// After [`connect`](Self::connect) a background task owns the socket. When
/// the transport fails the task reports `Error` and `StatusChanged(false)`,
/// then schedules a single reconnect after `reconnect_delay`. A failed
/// reconnect schedules the next one, until [`disconnect`](Self::disconnect).
pub struct ControlChannel {
    endpoint: ControlEndpoint,
    settings: ControlConfig,
    shared: Arc<Shared>,
}

impl ControlChannel {
    /// Create a channel and the receiver its events are delivered on
    pub fn new(
        endpoint: ControlEndpoint,
        settings: ControlConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ControlEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            events,
            closing: AtomicBool::new(false),
            outbound: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
            reconnects: AtomicU32::new(0),
        });

        (
            Self {
                endpoint,
                settings,
                shared,
            },
            rx,
        )
    }

    pub fn endpoint(&self) -> &ControlEndpoint {
        &self.endpoint
    }

    /// Start the connection task. No-op while one is already running.
    pub async fn connect(&self) -> Result<(), ControlError> {
        build_request(&self.endpoint, &self.settings)?;

        let mut task = self.shared.task.lock().await;
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return Ok(());
        }

        self.shared.closing.store(false, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        *self.shared.cancel.lock().await = cancel.clone();

        *task = Some(tokio::spawn(supervise(
            self.endpoint.clone(),
            self.settings.clone(),
            Arc::clone(&self.shared),
            cancel,
        )));
        Ok(())
    }

    /// Send an envelope on the live connection
    pub async fn send(&self, envelope: &Envelope) -> Result<(), ControlError> {
        let frame = encode_envelope(envelope)?;
        let outbound = self.shared.outbound.lock().await;
        let tx = outbound.as_ref().ok_or(ControlError::NotConnected)?;
        tx.send(frame).map_err(|_| ControlError::NotConnected)
    }

    /// Whether a connection is currently open
    pub async fn is_connected(&self) -> bool {
        self.shared.outbound.lock().await.is_some()
    }

    /// Reconnects scheduled since this channel was created
    pub fn reconnect_count(&self) -> u32 {
        self.shared.reconnects.load(Ordering::SeqCst)
    }

    /// Close with a normal-closure code and stop reconnecting. Idempotent.
    pub async fn disconnect(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        self.shared.cancel.lock().await.cancel();

        let task = self.shared.task.lock().await.take();
        if let Some(mut task) = task {
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                tracing::debug!("Control task did not stop in time, aborting");
                task.abort();
            }
        }
        self.shared.outbound.lock().await.take();
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        if let Ok(task) = self.shared.task.try_lock() {
            if let Some(task) = task.as_ref() {
                task.abort();
            }
        }
    }
}

fn build_request(endpoint: &ControlEndpoint, settings: &ControlConfig) -> Result<Request, ControlError> {
    let mut request = endpoint
        .url(settings.secure)
        .into_client_request()
        .map_err(|e| ControlError::InvalidEndpoint(e.to_string()))?;

    if let Some(psk) = &endpoint.psk {
        let name = HeaderName::from_bytes(settings.psk_header.as_bytes())
            .map_err(|e| ControlError::InvalidEndpoint(e.to_string()))?;
        let value =
            HeaderValue::from_str(psk).map_err(|e| ControlError::InvalidEndpoint(e.to_string()))?;
        request.headers_mut().insert(name, value);
    }

    Ok(request)
}

async fn dial(endpoint: &ControlEndpoint, settings: &ControlConfig) -> Result<WsStream, String> {
    let request = build_request(endpoint, settings).map_err(|e| e.to_string())?;
    let connector = settings
        .secure
        .then(|| Connector::Rustls(tls::permissive_client_config()));

    let handshake =
        tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector);
    let (ws, _) = tokio::time::timeout(settings.connect_timeout, handshake)
        .await
        .map_err(|_| format!("Connection timed out after {:?}", settings.connect_timeout))?
        .map_err(|e| e.to_string())?;
    Ok(ws)
}

/// Connection task: dial, run, and reconnect until cancelled
async fn supervise(
    endpoint: ControlEndpoint,
    settings: ControlConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let url = endpoint.url(settings.secure);

    loop {
        if shared.is_closing() {
            break;
        }

        tracing::info!("Connecting to daemon at {}", url);
        let dialed = tokio::select! {
            result = dial(&endpoint, &settings) => result,
            _ = cancel.cancelled() => break,
        };

        let failure = match dialed {
            Ok(ws) => {
                let (tx, rx) = mpsc::unbounded_channel();
                *shared.outbound.lock().await = Some(tx);
                tracing::info!("Connected to daemon at {}", url);
                shared.emit(ControlEvent::StatusChanged(true));

                let outcome = run_connection(ws, rx, &shared, &settings, &cancel).await;
                shared.outbound.lock().await.take();

                match outcome {
                    Ok(()) => {
                        tracing::info!("Disconnected from daemon at {}", url);
                        shared.emit(ControlEvent::StatusChanged(false));
                        break;
                    }
                    Err(reason) => {
                        if shared.is_closing() {
                            shared.emit(ControlEvent::StatusChanged(false));
                            break;
                        }
                        reason
                    }
                }
            }
            Err(reason) => {
                if shared.is_closing() {
                    break;
                }
                reason
            }
        };

        tracing::warn!("Control channel to {} failed: {}", url, failure);
        shared.emit(ControlEvent::Error(failure));
        shared.emit(ControlEvent::StatusChanged(false));

        shared.reconnects.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Reconnecting to {} in {:?}", url, settings.reconnect_delay);
        tokio::select! {
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
            _ = cancel.cancelled() => break,
        }
    }
}

/// Pump one open connection. `Ok` means it was closed on request.
async fn run_connection(
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    shared: &Shared,
    settings: &ControlConfig,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let (mut sink, mut stream) = ws.split();
    let mut keepalive = tokio::time::interval(settings.keepalive_interval);
    keepalive.tick().await;

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    match handle_inbound(&data, current_time_millis()) {
                        Inbound::Reply(reply) => {
                            tracing::debug!("Answering daemon ping");
                            let frame = encode_envelope(&reply).map_err(|e| e.to_string())?;
                            sink.send(Message::Binary(frame)).await.map_err(|e| e.to_string())?;
                        }
                        Inbound::Forward(envelope) => shared.emit(ControlEvent::Message(envelope)),
                        Inbound::Drop => {}
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    sink.send(Message::Pong(data)).await.map_err(|e| e.to_string())?;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_default();
                    return Err(format!("Closed by daemon {}", reason).trim_end().to_string());
                }
                Some(Ok(Message::Text(_))) => {
                    tracing::debug!("Ignoring text frame from daemon");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.to_string()),
                None => return Err("Connection closed".to_string()),
            },
            Some(frame) = outbound.recv() => {
                sink.send(Message::Binary(frame)).await.map_err(|e| e.to_string())?;
            }
            _ = keepalive.tick() => {
                sink.send(Message::Ping(Vec::new().into())).await.map_err(|e| e.to_string())?;
            }
            _ = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "User disconnect".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!("Close frame not delivered: {}", e);
                }
                return Ok(());
            }
        }
    }
}
