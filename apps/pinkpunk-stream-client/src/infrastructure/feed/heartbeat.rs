//! Heartbeat Monitor
//!
//! Detects silently-dead connections that remain technically open. While a
//! connection is open the monitor requests a ping on a fixed interval and
//! arms a timeout after each one; a pong observed before the timeout fires
//! defuses it, otherwise the monitor signals stale and the client recycles
//! the connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Window after each ping in which a pong must be observed.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }

    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &crate::WebSocketSettings) -> Self {
        Self {
            ping_interval: settings.heartbeat_interval,
            pong_timeout: settings.heartbeat_timeout,
        }
    }
}

/// Events emitted by the heartbeat monitor.
#[derive(Debug, Clone)]
pub enum HeartbeatEvent {
    /// Request to send a ping payload.
    SendPing,
    /// No pong within the window; the connection should be recycled.
    Timeout,
}

/// State shared between the monitor and the connection loop.
///
/// Reset per connection: a fresh instance is created on every successful
/// open, and every received pong clears the outstanding flag.
#[derive(Debug)]
pub struct HeartbeatState {
    last_ping: RwLock<Instant>,
    waiting_for_pong: AtomicBool,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create new heartbeat state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_ping: RwLock::new(Instant::now()),
            waiting_for_pong: AtomicBool::new(false),
        }
    }

    /// Mark that a ping went out and a pong is now outstanding.
    pub fn mark_ping_sent(&self) {
        *self.last_ping.write() = Instant::now();
        self.waiting_for_pong.store(true, Ordering::SeqCst);
    }

    /// Record that a pong was observed, defusing any armed timeout.
    pub fn record_pong(&self) {
        self.waiting_for_pong.store(false, Ordering::SeqCst);
    }

    /// Check whether a pong is outstanding.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.waiting_for_pong.load(Ordering::SeqCst)
    }

    /// Time since the last ping went out.
    #[must_use]
    pub fn time_since_ping(&self) -> Duration {
        self.last_ping.read().elapsed()
    }
}

/// Heartbeat monitor driving the ping/timeout cycle for one connection.
///
/// Runs until cancelled or a timeout is detected. The connection loop owns
/// the socket; the monitor only emits [`HeartbeatEvent`]s and reads the
/// shared state the loop updates on pong receipt.
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
    event_tx: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    /// Create a new heartbeat monitor.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        state: Arc<HeartbeatState>,
        event_tx: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            event_tx,
            cancel,
        }
    }

    /// Run the monitoring loop.
    pub async fn run(self) {
        let start = tokio::time::Instant::now() + self.config.ping_interval;
        let mut interval = tokio::time::interval_at(start, self.config.ping_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("heartbeat monitor cancelled");
                    return;
                }
                _ = interval.tick() => {
                    if self.ping_and_await_pong().await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Request a ping, then arm the pong timeout.
    ///
    /// Returns `Err(())` when the loop should exit: the window elapsed with
    /// no pong, the monitor was cancelled, or the event channel closed.
    async fn ping_and_await_pong(&self) -> Result<(), ()> {
        self.state.mark_ping_sent();
        if self.event_tx.send(HeartbeatEvent::SendPing).await.is_err() {
            tracing::debug!("event channel closed, stopping heartbeat");
            return Err(());
        }

        tokio::select! {
            () = self.cancel.cancelled() => Err(()),
            () = tokio::time::sleep(self.config.pong_timeout) => {
                if self.state.is_waiting_for_pong() {
                    tracing::warn!(
                        elapsed_ms = self.state.time_since_ping().as_millis(),
                        timeout_ms = self.config.pong_timeout.as_millis(),
                        "heartbeat timeout detected"
                    );
                    let _ = self.event_tx.send(HeartbeatEvent::Timeout).await;
                    return Err(());
                }
                Ok(())
            }
        }
    }
}
