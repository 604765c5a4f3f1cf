//! Trending Feed Client
//!
//! Owns the single logical WebSocket connection to the trending feed and
//! drives its lifecycle:
//!
//! - subscribe on open, then republish normalized token batches
//! - application-level ping/pong heartbeat with stale detection
//! - linear-backoff reconnection after abnormal closes
//! - four single-slot consumer callbacks with guarded invocation
//!
//! Nothing in here raises past the client boundary: every failure path
//! ends in a callback invocation or a log line.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use super::codec::{self, DecodeError};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor, HeartbeatState};
use super::messages::{ControlPayload, FeedEnvelope, FeedMessage};
use super::normalize;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::token::TrendingToken;

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced through the error callback.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The transport failed to open or errored while open.
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// A frame parsed as neither direct nor compressed JSON. The frame is
    /// dropped; the connection stays up.
    #[error("frame decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// An outbound control payload failed to serialize.
    #[error("control payload encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// A registered consumer callback returned an error.
    #[error("consumer callback failed: {0}")]
    Callback(anyhow::Error),

    /// The attempt budget ran out; automatic recovery has stopped until
    /// `connect()` or `reconnect()` is called again.
    #[error("failed to reconnect after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no pending attempt.
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// The transport is open and subscribed.
    Open,
    /// A manual teardown is in progress.
    Closing,
}

// =============================================================================
// Consumer Callbacks
// =============================================================================

type MessageHandler = Box<dyn FnMut(Vec<TrendingToken>) -> anyhow::Result<()> + Send>;
type LifecycleHandler = Box<dyn FnMut() -> anyhow::Result<()> + Send>;
type ErrorHandler = Box<dyn FnMut(&FeedError) -> anyhow::Result<()> + Send>;

/// Single-slot callback registry; the latest registration wins.
///
/// Invocation is guarded: an `Err` from a handler is routed to the error
/// slot instead of unwinding into the connection loop, so a misbehaving
/// consumer cannot corrupt heartbeat or reconnect bookkeeping.
#[derive(Default)]
struct Handlers {
    on_message: Mutex<Option<MessageHandler>>,
    on_connect: Mutex<Option<LifecycleHandler>>,
    on_disconnect: Mutex<Option<LifecycleHandler>>,
    on_error: Mutex<Option<ErrorHandler>>,
}

impl Handlers {
    fn emit_message(&self, batch: Vec<TrendingToken>) {
        let result = match self.on_message.lock().as_mut() {
            Some(handler) => handler(batch),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.emit_error(&FeedError::Callback(e));
        }
    }

    fn emit_connect(&self) {
        self.emit_lifecycle(&self.on_connect);
    }

    fn emit_disconnect(&self) {
        self.emit_lifecycle(&self.on_disconnect);
    }

    fn emit_lifecycle(&self, slot: &Mutex<Option<LifecycleHandler>>) {
        let result = match slot.lock().as_mut() {
            Some(handler) => handler(),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.emit_error(&FeedError::Callback(e));
        }
    }

    fn emit_error(&self, error: &FeedError) {
        let result = match self.on_error.lock().as_mut() {
            Some(handler) => handler(error),
            None => {
                tracing::error!(error = %error, "unhandled feed error");
                Ok(())
            }
        };
        if let Err(e) = result {
            // The error slot has nowhere left to report to.
            tracing::error!(error = %e, "error handler itself failed");
        }
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the trending feed client.
#[derive(Debug, Clone)]
pub struct TrendingClientConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Chain identifier carried on subscribe and ping payloads.
    pub chain_id: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Heartbeat configuration.
    pub heartbeat: HeartbeatConfig,
}

impl TrendingClientConfig {
    /// Create a new configuration with default heartbeat and reconnect
    /// behavior.
    #[must_use]
    pub fn new(url: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            chain_id: chain_id.into(),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Create configuration from loaded `ClientSettings`.
    #[must_use]
    pub fn from_settings(settings: &crate::ClientSettings) -> Self {
        Self {
            url: settings.feed.url.clone(),
            chain_id: settings.feed.chain_id.clone(),
            reconnect: ReconnectConfig::from_websocket_settings(&settings.websocket),
            heartbeat: HeartbeatConfig::from_websocket_settings(&settings.websocket),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// How one connection attempt or open session ended.
#[derive(Debug)]
enum StreamEnd {
    /// Manual disconnect; the caller owns teardown callbacks.
    Cancelled,
    /// Transport failed to open or errored while open.
    Transport(FeedError),
    /// Peer closed the stream.
    Closed,
    /// No pong within the timeout window.
    HeartbeatTimeout,
}

struct SessionHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// WebSocket client for the trending token feed.
///
/// One instance owns at most one transport connection at a time. Consumers
/// register callbacks, call [`connect`](Self::connect), and receive
/// normalized [`TrendingToken`] batches until they call
/// [`disconnect`](Self::disconnect).
pub struct TrendingClient {
    config: TrendingClientConfig,
    handlers: Arc<Handlers>,
    state: Arc<RwLock<ConnectionState>>,
    session: Mutex<Option<SessionHandle>>,
}

impl TrendingClient {
    /// Create a new client; no connection is attempted until
    /// [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: TrendingClientConfig) -> Self {
        Self {
            config,
            handlers: Arc::new(Handlers::default()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            session: Mutex::new(None),
        }
    }

    // =========================================================================
    // Callback Registration
    // =========================================================================

    /// Register the token batch handler. Replaces any previous handler.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(Vec<TrendingToken>) -> anyhow::Result<()> + Send + 'static,
    {
        *self.handlers.on_message.lock() = Some(Box::new(handler));
    }

    /// Register the connect handler. Replaces any previous handler.
    pub fn on_connect<F>(&self, handler: F)
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        *self.handlers.on_connect.lock() = Some(Box::new(handler));
    }

    /// Register the disconnect handler. Replaces any previous handler.
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        *self.handlers.on_disconnect.lock() = Some(Box::new(handler));
    }

    /// Register the error handler. Replaces any previous handler.
    pub fn on_error<F>(&self, handler: F)
    where
        F: FnMut(&FeedError) -> anyhow::Result<()> + Send + 'static,
    {
        *self.handlers.on_error.lock() = Some(Box::new(handler));
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Start the connection session.
    ///
    /// No-op while a session is already connecting, open, or waiting out a
    /// backoff delay. The outcome is reported asynchronously: success via
    /// the connect callback, failure via the error callback.
    pub fn connect(&self) {
        let mut session = self.session.lock();
        if let Some(existing) = session.as_ref() {
            if !existing.task.is_finished() {
                tracing::debug!("connect ignored, session already active");
                return;
            }
        }

        *self.state.write() = ConnectionState::Connecting;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.session_context().run(cancel.clone()));
        *session = Some(SessionHandle { cancel, task });
    }

    /// Tear down the current connection, if any.
    ///
    /// Safe in any state and idempotent: stops the heartbeat, closes the
    /// transport, suppresses any pending automatic reconnect, and fires the
    /// disconnect callback exactly once per live session.
    pub fn disconnect(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        let was_live = {
            let mut state = self.state.write();
            if *state == ConnectionState::Disconnected {
                false
            } else {
                *state = ConnectionState::Closing;
                true
            }
        };

        session.cancel.cancel();
        *self.state.write() = ConnectionState::Disconnected;

        if was_live {
            tracing::info!("trending feed disconnected");
            self.handlers.emit_disconnect();
        }
    }

    /// Consumer-initiated recovery: tear down and connect again
    /// immediately, bypassing any backoff delay.
    pub fn reconnect(&self) {
        self.disconnect();
        self.connect();
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Open
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            config: self.config.clone(),
            handlers: Arc::clone(&self.handlers),
            state: Arc::clone(&self.state),
        }
    }
}

// =============================================================================
// Session Loop
// =============================================================================

/// The shared pieces one spawned session task works with.
struct SessionContext {
    config: TrendingClientConfig,
    handlers: Arc<Handlers>,
    state: Arc<RwLock<ConnectionState>>,
}

impl SessionContext {
    /// Write a lifecycle state unless the session has been cancelled;
    /// a cancelled session's teardown owns the state cell.
    fn set_state(&self, cancel: &CancellationToken, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        if cancel.is_cancelled() {
            return false;
        }
        *state = next;
        true
    }

    /// Drive connect attempts and reconnection until cancelled, the
    /// attempt budget runs out, or a manual disconnect.
    async fn run(self, cancel: CancellationToken) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if !self.set_state(&cancel, ConnectionState::Connecting) {
                return;
            }

            let end = self.connect_and_stream(&cancel, &mut policy).await;

            if cancel.is_cancelled() {
                // Manual disconnect owns the teardown callbacks.
                return;
            }
            self.set_state(&cancel, ConnectionState::Disconnected);

            // Single teardown path: report, notify, then consult the policy.
            match end {
                StreamEnd::Cancelled => return,
                StreamEnd::Transport(e) => {
                    tracing::warn!(error = %e, "trending feed transport error");
                    self.handlers.emit_error(&e);
                }
                StreamEnd::Closed => {
                    tracing::info!("trending feed connection closed by peer");
                }
                StreamEnd::HeartbeatTimeout => {
                    tracing::warn!("heartbeat timeout, recycling connection");
                }
            }
            self.handlers.emit_disconnect();

            let Some(delay) = policy.next_delay() else {
                let attempts = policy.attempt_count();
                tracing::error!(attempts, "reconnection attempts exhausted");
                self.handlers
                    .emit_error(&FeedError::ReconnectExhausted { attempts });
                return;
            };

            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "scheduling reconnect"
            );
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Open the transport and process frames until the session ends.
    async fn connect_and_stream(
        &self,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
    ) -> StreamEnd {
        tracing::info!(url = %self.config.url, "connecting to trending feed");

        let ws_stream = tokio::select! {
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            result = tokio_tungstenite::connect_async(&self.config.url) => match result {
                Ok((ws_stream, _response)) => ws_stream,
                Err(e) => return StreamEnd::Transport(e.into()),
            }
        };

        let (mut write, mut read) = ws_stream.split();

        // Entering Open: reset the attempt budget, subscribe, start the
        // heartbeat, then notify the consumer.
        if !self.set_state(cancel, ConnectionState::Open) {
            return StreamEnd::Cancelled;
        }
        policy.reset();

        let subscribe = ControlPayload::subscribe(&self.config.chain_id);
        if let Err(e) = send_payload(&mut write, &subscribe).await {
            return StreamEnd::Transport(e);
        }
        tracing::debug!("subscribe payload sent");

        let heartbeat_state = Arc::new(HeartbeatState::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(8);
        let heartbeat_cancel = cancel.child_token();
        let monitor = HeartbeatMonitor::new(
            self.config.heartbeat.clone(),
            Arc::clone(&heartbeat_state),
            heartbeat_tx,
            heartbeat_cancel.clone(),
        );
        tokio::spawn(monitor.run());

        tracing::info!("trending feed connected");
        self.handlers.emit_connect();

        let end = loop {
            tokio::select! {
                () = cancel.cancelled() => break StreamEnd::Cancelled,
                event = heartbeat_rx.recv() => match event {
                    Some(HeartbeatEvent::SendPing) => {
                        let ping = ControlPayload::ping(&self.config.chain_id);
                        if let Err(e) = send_payload(&mut write, &ping).await {
                            break StreamEnd::Transport(e);
                        }
                    }
                    Some(HeartbeatEvent::Timeout) => break StreamEnd::HeartbeatTimeout,
                    None => {
                        tracing::debug!("heartbeat channel closed");
                    }
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let decoded = codec::decode_text(text.as_str());
                        if let Some(reply) = self.handle_frame(decoded, &heartbeat_state) {
                            if let Err(e) = send_payload(&mut write, &reply).await {
                                break StreamEnd::Transport(e);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let decoded = codec::decode_binary(&bytes);
                        if let Some(reply) = self.handle_frame(decoded, &heartbeat_state) {
                            if let Err(e) = send_payload(&mut write, &reply).await {
                                break StreamEnd::Transport(e);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            break StreamEnd::Transport(e.into());
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        heartbeat_state.record_pong();
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("server sent close frame");
                        break StreamEnd::Closed;
                    }
                    Some(Ok(_)) => {
                        // Ignore other frame types.
                    }
                    Some(Err(e)) => break StreamEnd::Transport(e.into()),
                    None => {
                        tracing::info!("websocket stream ended");
                        break StreamEnd::Closed;
                    }
                }
            }
        };

        // No heartbeat activity may fire once the connection is gone.
        heartbeat_cancel.cancel();
        end
    }

    /// Handle one decoded frame; returns a control payload to send back,
    /// if any. Undecodable frames are reported and dropped without
    /// touching the connection.
    fn handle_frame(
        &self,
        decoded: Result<FeedEnvelope, DecodeError>,
        heartbeat: &HeartbeatState,
    ) -> Option<ControlPayload> {
        let envelope = match decoded {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                self.handlers.emit_error(&FeedError::Decode(e));
                return None;
            }
        };

        match FeedMessage::classify(envelope) {
            FeedMessage::Ping { echo } => {
                // The peer's liveness message doubles as our pong.
                heartbeat.record_pong();
                Some(ControlPayload::pong(echo))
            }
            FeedMessage::Pong => {
                heartbeat.record_pong();
                None
            }
            FeedMessage::Data(records) => {
                let batch = normalize::normalize_batch(records);
                tracing::debug!(tokens = batch.len(), "forwarding token batch");
                self.handlers.emit_message(batch);
                None
            }
            FeedMessage::Subscribed => {
                tracing::debug!("trending subscription acknowledged");
                None
            }
            FeedMessage::Unknown => {
                tracing::debug!("ignoring unclassified feed message");
                None
            }
        }
    }
}

/// Serialize and send one control payload.
async fn send_payload<W>(write: &mut W, payload: &ControlPayload) -> Result<(), FeedError>
where
    W: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = payload.to_json()?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn test_client() -> TrendingClient {
        TrendingClient::new(TrendingClientConfig::new("ws://127.0.0.1:1/ws", "56"))
    }

    fn ping_envelope(echo: Option<&str>) -> Result<FeedEnvelope, DecodeError> {
        Ok(FeedEnvelope {
            topic: Some("ping".to_string()),
            pong: echo.map(str::to_string),
            ..FeedEnvelope::default()
        })
    }

    #[test]
    fn new_client_starts_disconnected() {
        let client = test_client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[test]
    fn latest_handler_registration_wins() {
        let client = test_client();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        client.on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&second);
        client.on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.handlers.emit_message(vec![]);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_callback_is_routed_to_error_handler() {
        let client = test_client();
        let errors = Arc::new(AtomicUsize::new(0));

        client.on_message(|_| anyhow::bail!("consumer bug"));
        let counter = Arc::clone(&errors);
        client.on_error(move |error| {
            assert!(matches!(error, FeedError::Callback(_)));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.handlers.emit_message(vec![]);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_error_handler_does_not_unwind() {
        let client = test_client();
        client.on_error(|_| anyhow::bail!("error handler bug"));
        client.on_message(|_| anyhow::bail!("consumer bug"));

        // Must not panic or recurse.
        client.handlers.emit_message(vec![]);
    }

    #[test]
    fn inbound_ping_yields_pong_reply_and_records_liveness() {
        let client = test_client();
        let heartbeat = HeartbeatState::new();
        heartbeat.mark_ping_sent();

        let reply = client
            .session_context()
            .handle_frame(ping_envelope(Some("abc")), &heartbeat);

        let reply = reply.expect("ping should produce a pong reply");
        assert_eq!(reply.topic, "pong");
        assert_eq!(reply.pong.as_deref(), Some("abc"));
        assert!(!heartbeat.is_waiting_for_pong());
    }

    #[test]
    fn inbound_ping_is_not_forwarded_to_consumer() {
        let client = test_client();
        let messages = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&messages);
        client.on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _reply = client
            .session_context()
            .handle_frame(ping_envelope(Some("abc")), &HeartbeatState::new());
        assert_eq!(messages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn data_frame_reaches_consumer_normalized() {
        let client = test_client();
        let (tx, rx) = std::sync::mpsc::channel();
        client.on_message(move |batch| {
            tx.send(batch).map_err(|_| anyhow::anyhow!("receiver dropped"))
        });

        let envelope = codec::decode_text(
            r#"{"data":[{"baseSymbol":"ACM","priceUsd":0.122916,"priceChange1h":0.0108}]}"#,
        );
        let reply = client
            .session_context()
            .handle_frame(envelope, &HeartbeatState::new());
        assert!(reply.is_none());

        let batch = rx.try_recv().expect("batch should be forwarded");
        assert_eq!(batch[0].rank, 1);
        assert_eq!(batch[0].symbol, "ACM");
        assert!((batch[0].price_change_1h - 1.08).abs() < 1e-9);
    }

    #[test]
    fn undecodable_frame_reports_decode_error_and_drops() {
        let client = test_client();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        client.on_error(move |error| {
            assert!(matches!(error, FeedError::Decode(_)));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let reply = client
            .session_context()
            .handle_frame(codec::decode_text("garbage"), &HeartbeatState::new());
        assert!(reply.is_none());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_without_session_is_a_no_op() {
        let client = test_client();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disconnects);
        client.on_disconnect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.disconnect();
        client.disconnect();
        assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    }
}
