//! The persistent gateway session.
//!
//! One session owns one live websocket at a time. The connection loop
//! performs the hello/identify handshake, runs the heartbeat timer, tracks
//! the dispatch sequence, and forwards decoded dispatch events into the
//! event pipeline. Transient failures reconnect with exponential backoff and
//! attempt a resume before falling back to a fresh identify; only explicit
//! shutdown or authentication rejection stops the loop for good.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use ferrite_core::{Dispatcher, GatewayError, GatewayResult, RestError};

use crate::backoff::Backoff;
use crate::config::GatewayConfig;
use crate::frame::{
    DispatchEvent, Heartbeat, Identify, InboundFrame, OutboundFrame, Resume, ResumeRejected,
};
use crate::rest::RestClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Close code the server uses for credential rejection.
const CLOSE_AUTH_FAILED: u16 = 4004;

// =============================================================================
// Event sink
// =============================================================================

/// Where decoded dispatch events go.
///
/// The session does not know what consumes its events; the dispatcher
/// implements this, and tests can substitute a recorder.
pub trait EventSink: Send + Sync {
    /// Offers an event; returns false when the sink applies backpressure.
    fn accept(&self, name: &str, args: Vec<Value>) -> bool;
}

impl EventSink for Dispatcher {
    fn accept(&self, name: &str, args: Vec<Value>) -> bool {
        self.emit(name, args)
    }
}

// =============================================================================
// Session state
// =============================================================================

/// Connection state of the gateway session.
///
/// [`SessionState::Connected`] is the only state from which dispatch events
/// are forwarded to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport, no reconnect pending.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for the hello frame.
    AwaitingHello,
    /// Identify or resume sent, waiting for ready/resumed.
    Identifying,
    /// Session established; dispatch events flow.
    Connected,
    /// Transport lost, waiting out the backoff delay.
    Reconnecting,
}

/// Durable per-session data surviving transient drops.
#[derive(Debug, Default)]
pub(crate) struct SessionMemory {
    pub(crate) last_seq: Option<u64>,
    pub(crate) session_id: Option<String>,
    pub(crate) resume_token: Option<String>,
}

impl SessionMemory {
    /// Records a dispatch sequence number; the tracked value never decreases.
    pub(crate) fn observe_seq(&mut self, seq: u64) {
        if self.last_seq.is_none_or(|last| seq > last) {
            self.last_seq = Some(seq);
        }
    }

    /// Drops the resumable session data after a rejected resume.
    fn clear_session(&mut self) {
        self.session_id = None;
        self.resume_token = None;
        self.last_seq = None;
    }
}

// =============================================================================
// Entry point
// =============================================================================

/// Logs in and spawns the gateway session loop.
///
/// When `rest` is provided, an identity lookup runs first; an authentication
/// rejection there is fatal before any socket is opened. The returned handle
/// observes state, exposes the tracked sequence, and shuts the session down
/// cooperatively.
pub async fn connect(
    config: GatewayConfig,
    sink: Arc<dyn EventSink>,
    rest: Option<Arc<RestClient>>,
) -> GatewayResult<SessionHandle> {
    if let Some(rest) = rest {
        match rest.request(Method::GET, &config.identity_path, None).await {
            Ok(identity) => {
                info!(identity = %identity, "Gateway identity resolved");
            }
            Err(RestError::AuthenticationRejected { status }) => {
                return Err(GatewayError::AuthenticationRejected {
                    reason: format!("identity lookup rejected with status {status}"),
                });
            }
            Err(error) => {
                warn!(error = %error, "Identity lookup failed, connecting anyway");
            }
        }
    }

    let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let memory = Arc::new(Mutex::new(SessionMemory::default()));
    let shutdown_timeout = config.shutdown_timeout;

    let session = GatewaySession {
        backoff: Backoff::new(config.backoff.clone()),
        config,
        sink,
        memory: Arc::clone(&memory),
        state_tx,
        shutdown_rx,
    };
    let task = tokio::spawn(session.run());

    Ok(SessionHandle {
        state_rx,
        shutdown_tx,
        memory,
        task: Mutex::new(Some(task)),
        shutdown_timeout,
    })
}

/// Handle to a running gateway session.
pub struct SessionHandle {
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    memory: Arc<Mutex<SessionMemory>>,
    task: Mutex<Option<JoinHandle<GatewayResult<()>>>>,
    shutdown_timeout: Duration,
}

impl SessionHandle {
    /// Returns the current connection state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Returns the last dispatch sequence observed, if any.
    pub fn last_seq(&self) -> Option<u64> {
        self.memory.lock().last_seq
    }

    /// Returns the server-assigned session id, once ready.
    pub fn session_id(&self) -> Option<String> {
        self.memory.lock().session_id.clone()
    }

    /// Requests cooperative shutdown and waits (bounded) for the loop to
    /// finish in-flight frame processing before giving up and aborting.
    pub async fn shutdown(&self) -> GatewayResult<()> {
        let _ = self.shutdown_tx.send(true);
        let Some(mut task) = self.task.lock().take() else {
            return Ok(());
        };
        match timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join)) => Err(GatewayError::Closed {
                reason: "session task panicked".to_string(),
            }),
            Err(_) => {
                warn!("Session did not stop within the shutdown timeout, aborting");
                task.abort();
                Ok(())
            }
        }
    }

    /// Waits for the session loop to end on its own.
    ///
    /// Returns the fatal error that stopped it, if any. Only authentication
    /// rejection and explicit shutdown end the loop.
    pub async fn wait(&self) -> GatewayResult<()> {
        let Some(task) = self.task.lock().take() else {
            return Ok(());
        };
        task.await.unwrap_or(Err(GatewayError::Closed {
            reason: "session task panicked".to_string(),
        }))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .field("last_seq", &self.last_seq())
            .finish()
    }
}

// =============================================================================
// Connection loop
// =============================================================================

/// Why the per-connection loop returned without an error.
enum LoopExit {
    Shutdown,
}

/// State for one gateway session across reconnects.
struct GatewaySession {
    config: GatewayConfig,
    sink: Arc<dyn EventSink>,
    memory: Arc<Mutex<SessionMemory>>,
    state_tx: watch::Sender<SessionState>,
    shutdown_rx: watch::Receiver<bool>,
    backoff: Backoff,
}

impl GatewaySession {
    fn set_state(&self, state: SessionState) {
        let _ = self.state_tx.send(state);
    }

    fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == SessionState::Connected
    }

    /// Outer loop: connect, run, reconnect with backoff until shutdown or a
    /// fatal error.
    async fn run(mut self) -> GatewayResult<()> {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            self.set_state(SessionState::Connecting);

            match self.run_connection().await {
                Ok(LoopExit::Shutdown) => break,
                Err(error) if error.is_fatal() => {
                    self.set_state(SessionState::Disconnected);
                    return Err(error);
                }
                Err(error) => {
                    if let Some(max) = self.config.max_retries {
                        if self.backoff.attempt() >= max {
                            warn!("Max reconnect attempts reached, giving up");
                            self.set_state(SessionState::Disconnected);
                            return Err(error);
                        }
                    }
                    let delay = self.backoff.next_delay();
                    warn!(error = %error, delay = ?delay, "Gateway connection lost, reconnecting");
                    self.set_state(SessionState::Reconnecting);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown_rx.changed() => {
                            if *self.shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.set_state(SessionState::Disconnected);
        info!("Gateway session shut down");
        Ok(())
    }

    /// Runs one transport: handshake, heartbeat, frame pump.
    async fn run_connection(&mut self) -> GatewayResult<LoopExit> {
        info!(url = %self.config.url, "Connecting to gateway");

        let (ws_stream, _response) =
            connect_async(&self.config.url)
                .await
                .map_err(|e| GatewayError::ConnectionFailed {
                    url: self.config.url.clone(),
                    reason: e.to_string(),
                })?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        self.set_state(SessionState::AwaitingHello);
        let hello = self.await_hello(&mut ws_rx).await?;
        let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval);
        debug!(interval = ?heartbeat_interval, "Received hello");

        self.set_state(SessionState::Identifying);
        self.send_identify_or_resume(&mut ws_tx).await?;

        // The interval is immutable for the life of this connection.
        let mut heartbeat = interval(heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;
        let mut last_ack = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Gateway session shutting down");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return Ok(LoopExit::Shutdown);
                    }
                }

                _ = heartbeat.tick() => {
                    if last_ack.elapsed() > heartbeat_interval + self.config.heartbeat_grace {
                        warn!("No heartbeat ack within interval, closing zombied connection");
                        let _ = ws_tx.close().await;
                        return Err(GatewayError::Closed {
                            reason: "heartbeat timed out".to_string(),
                        });
                    }
                    let last_seq = self.memory.lock().last_seq;
                    self.send_frame(&mut ws_tx, &OutboundFrame::Heartbeat {
                        d: Heartbeat { last_seq },
                    })
                    .await?;
                    trace!(last_seq = ?last_seq, "Sent heartbeat");
                }

                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&mut ws_tx, text.as_str(), &mut last_ack).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            match std::str::from_utf8(&data) {
                                Ok(text) => {
                                    self.handle_frame(&mut ws_tx, text, &mut last_ack).await?;
                                }
                                Err(error) => {
                                    return Err(GatewayError::Decode {
                                        reason: format!("invalid UTF-8 in binary frame: {error}"),
                                    });
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            trace!("Received ping, sending pong");
                            let _ = ws_tx.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            trace!("Received pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            if let Some(frame) = &frame {
                                let code: u16 = frame.code.into();
                                if code == CLOSE_AUTH_FAILED {
                                    return Err(GatewayError::AuthenticationRejected {
                                        reason: frame.reason.to_string(),
                                    });
                                }
                            }
                            return Err(GatewayError::Closed {
                                reason: format!("server closed connection: {frame:?}"),
                            });
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(error)) => {
                            return Err(GatewayError::Closed {
                                reason: error.to_string(),
                            });
                        }
                        None => {
                            return Err(GatewayError::Closed {
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Waits for the hello frame within the configured timeout.
    async fn await_hello(&self, ws_rx: &mut WsSource) -> GatewayResult<crate::frame::Hello> {
        let wait = async {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => match InboundFrame::decode(text.as_str())? {
                        InboundFrame::Hello { d } => return Ok(d),
                        other => debug!(frame = ?other, "Ignoring pre-hello frame"),
                    },
                    Ok(_) => {}
                    Err(error) => {
                        return Err(GatewayError::Closed {
                            reason: error.to_string(),
                        });
                    }
                }
            }
            Err(GatewayError::Closed {
                reason: "stream ended before hello".to_string(),
            })
        };

        match timeout(self.config.hello_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::HelloTimeout(self.config.hello_timeout)),
        }
    }

    /// Sends a resume when session data is stored, a fresh identify otherwise.
    async fn send_identify_or_resume(&self, ws_tx: &mut WsSink) -> GatewayResult<()> {
        let stored = {
            let memory = self.memory.lock();
            memory
                .session_id
                .clone()
                .zip(memory.resume_token.clone())
                .map(|(session_id, resume_token)| (session_id, resume_token, memory.last_seq))
        };

        let frame = match stored {
            Some((session_id, resume_token, last_seq)) => {
                debug!(session_id = %session_id, last_seq = ?last_seq, "Resuming session");
                OutboundFrame::Resume {
                    d: Resume {
                        session_id,
                        resume_token,
                        last_seq,
                    },
                }
            }
            None => {
                debug!(shard = ?self.config.shard, "Identifying");
                OutboundFrame::Identify {
                    d: Identify {
                        token: self.config.token.clone(),
                        capabilities: self.config.capabilities,
                        shard: [self.config.shard.0, self.config.shard.1],
                    },
                }
            }
        };
        self.send_frame(ws_tx, &frame).await
    }

    async fn send_frame(&self, ws_tx: &mut WsSink, frame: &OutboundFrame) -> GatewayResult<()> {
        let text = frame.encode()?;
        ws_tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatewayError::SendFailed(e.to_string()))
    }

    /// Handles one decoded inbound frame.
    async fn handle_frame(
        &mut self,
        ws_tx: &mut WsSink,
        raw: &str,
        last_ack: &mut Instant,
    ) -> GatewayResult<()> {
        match InboundFrame::decode(raw)? {
            InboundFrame::Hello { .. } => {
                debug!("Ignoring duplicate hello");
            }
            InboundFrame::HeartbeatAck => {
                *last_ack = Instant::now();
                trace!("Heartbeat acknowledged");
            }
            InboundFrame::Dispatch { t, s, d } => {
                if let Some(seq) = s {
                    self.memory.lock().observe_seq(seq);
                }
                self.handle_dispatch(&t, d)?;
            }
            InboundFrame::ResumeRejected { d } => {
                self.handle_resume_rejected(ws_tx, d).await?;
            }
            InboundFrame::Unknown => {
                debug!("Ignoring unknown control frame");
            }
        }
        Ok(())
    }

    fn handle_dispatch(&mut self, kind: &str, payload: Value) -> GatewayResult<()> {
        let event = DispatchEvent::decode(kind, payload)?;

        match &event {
            DispatchEvent::Ready(snapshot) => {
                info!(session_id = %snapshot.session_id, "Gateway session ready");
                {
                    let mut memory = self.memory.lock();
                    memory.session_id = Some(snapshot.session_id.clone());
                    memory.resume_token = Some(snapshot.resume_token.clone());
                }
                self.backoff.reset();
                self.set_state(SessionState::Connected);
            }
            DispatchEvent::Resumed => {
                info!("Gateway session resumed");
                self.backoff.reset();
                self.set_state(SessionState::Connected);
            }
            other => {
                if !self.is_connected() {
                    debug!(event = %other.event_name(), "Dropping dispatch before ready");
                    return Ok(());
                }
            }
        }

        let name = event.event_name();
        if !self.sink.accept(&name, vec![event.payload()]) {
            debug!(event = %name, "Event sink applied backpressure, dispatch dropped");
        }
        Ok(())
    }

    async fn handle_resume_rejected(
        &mut self,
        ws_tx: &mut WsSink,
        rejection: ResumeRejected,
    ) -> GatewayResult<()> {
        warn!(
            resumable = rejection.resumable,
            "Resume rejected, falling back to fresh identify"
        );
        self.memory.lock().clear_session();
        self.set_state(SessionState::Identifying);
        self.send_identify_or_resume(ws_tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_tracking_is_monotonic() {
        let mut memory = SessionMemory::default();
        assert_eq!(memory.last_seq, None);

        for seq in [1, 3, 2, 7, 5] {
            memory.observe_seq(seq);
        }
        assert_eq!(memory.last_seq, Some(7));
    }

    #[test]
    fn clearing_session_drops_resume_data() {
        let mut memory = SessionMemory {
            last_seq: Some(12),
            session_id: Some("s1".to_string()),
            resume_token: Some("r1".to_string()),
        };
        memory.clear_session();
        assert_eq!(memory.last_seq, None);
        assert_eq!(memory.session_id, None);
        assert_eq!(memory.resume_token, None);
    }
}
