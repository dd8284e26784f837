//! Event channel lifecycle.
//!
//! One spawned task owns the transport and walks the
//! `connecting → open → (degraded → open | closed)` machine. Parsed
//! events and resync requests flow out over an mpsc channel;
//! connectivity is published over a watch channel for display.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use esq_core::{ConnectionState, QueueEvent};

use crate::backoff::ReconnectPolicy;
use crate::error::{ChannelError, ChannelResult};
use crate::wire::{parse_frame, subscribe_message};

/// Channel name subscribed to on every (re)connect.
pub const ESCALATIONS_CHANNEL: &str = "escalations";

/// Push-channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint, e.g. `wss://backend.example/events`.
    pub url: String,
    /// Channel name for the subscribe handshake.
    pub channel: String,
    /// Bound on a single connect + handshake attempt.
    pub connect_timeout: Duration,
    /// Backoff policy between reconnect attempts.
    pub reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    /// Create a configuration for an endpoint with defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel: ESCALATIONS_CHANNEL.to_string(),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Builder: set the subscribe channel name.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Builder: set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// Diagnostic counters, shared with the channel task.
#[derive(Debug, Default)]
pub struct ChannelStats {
    malformed_dropped: AtomicU64,
    reconnects: AtomicU64,
}

impl ChannelStats {
    /// Inbound frames dropped because they failed to parse.
    #[must_use]
    pub fn malformed_dropped(&self) -> u64 {
        self.malformed_dropped.load(Ordering::Relaxed)
    }

    /// Successful reconnects after a degraded period.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

/// Output of the channel task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    /// A parsed create/update/resolve event.
    Event(QueueEvent),
    /// The channel reconnected after a gap; events in between are
    /// lost, so the consumer must fetch a fresh snapshot.
    Resync,
}

/// Owns the spawned channel task.
pub struct EventChannel {
    config: ChannelConfig,
    stats: Arc<ChannelStats>,
}

impl EventChannel {
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            stats: Arc::new(ChannelStats::default()),
        }
    }

    /// Shared view of the diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the channel task and return its handle.
    #[must_use]
    pub fn spawn(self) -> ChannelHandle {
        let (signal_tx, signal_rx) = mpsc::channel(256);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::clone(&self.stats);

        let join = tokio::spawn(run_channel(
            self.config,
            stats,
            signal_tx,
            state_tx,
            shutdown_rx,
        ));

        ChannelHandle {
            signals: signal_rx,
            state: state_rx,
            stats: self.stats,
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Consumer-side handle: signals out, state to display, cancelable.
pub struct ChannelHandle {
    /// Parsed events and resync requests.
    pub signals: mpsc::Receiver<ChannelSignal>,
    /// Live connectivity for the badge.
    pub state: watch::Receiver<ConnectionState>,
    /// Diagnostic counters.
    pub stats: Arc<ChannelStats>,
    shutdown: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl ChannelHandle {
    /// Build a handle not backed by a transport task, fed by the
    /// returned senders. Lets consumers run against a scripted feed
    /// instead of a live socket.
    #[must_use]
    pub fn detached() -> (
        Self,
        mpsc::Sender<ChannelSignal>,
        watch::Sender<ConnectionState>,
    ) {
        let (signal_tx, signal_rx) = mpsc::channel(256);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let handle = Self {
            signals: signal_rx,
            state: state_rx,
            stats: Arc::new(ChannelStats::default()),
            shutdown: shutdown_tx,
            join: tokio::spawn(async {}),
        };
        (handle, signal_tx, state_tx)
    }

    /// Current connectivity.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Tear the channel down: releases the transport, cancels any
    /// pending reconnect timer, and waits for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

enum LoopExit {
    /// Shutdown requested; stop entirely.
    Shutdown,
    /// Consumer dropped the receiver; stop entirely.
    ReceiverGone,
    /// Transport dropped; reconnect.
    Disconnected(ChannelError),
}

async fn run_channel(
    config: ChannelConfig,
    stats: Arc<ChannelStats>,
    signal_tx: mpsc::Sender<ChannelSignal>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;
    let mut ever_open = false;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match connect_and_subscribe(&config).await {
            Ok(mut ws) => {
                attempt = 0;
                let needs_resync = ever_open;
                ever_open = true;
                let _ = state_tx.send(ConnectionState::Open);
                info!(url = %config.url, resync = needs_resync, "push channel open");

                if needs_resync {
                    stats.reconnects.fetch_add(1, Ordering::Relaxed);
                    // Events missed while degraded are silently lost;
                    // the consumer must re-baseline from a snapshot.
                    if signal_tx.send(ChannelSignal::Resync).await.is_err() {
                        break;
                    }
                }

                match read_loop(&mut ws, &stats, &signal_tx, &mut shutdown_rx).await {
                    LoopExit::Shutdown => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    LoopExit::ReceiverGone => break,
                    LoopExit::Disconnected(error) => {
                        warn!(error = %error, "push channel lost");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, attempt, "push channel connect failed");
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }

        // Degraded only once we have been open; before that we are
        // still connecting for the first time.
        let _ = state_tx.send(if ever_open {
            ConnectionState::Degraded
        } else {
            ConnectionState::Connecting
        });

        let delay = config.reconnect.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        debug!(delay_ms = delay.as_millis() as u64, attempt, "scheduling reconnect");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    let _ = state_tx.send(ConnectionState::Closed);
    info!("push channel closed");
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect_and_subscribe(config: &ChannelConfig) -> ChannelResult<WsStream> {
    let url = Url::parse(&config.url)
        .map_err(|e: url::ParseError| ChannelError::ConnectionFailed(e.to_string()))?;

    let connect_result =
        tokio::time::timeout(config.connect_timeout, connect_async(url.as_str())).await;

    let Ok(ws_result) = connect_result else {
        return Err(ChannelError::Timeout(config.connect_timeout));
    };

    let (mut ws, _response) = ws_result.map_err(|e: tokio_tungstenite::tungstenite::Error| {
        ChannelError::ConnectionFailed(e.to_string())
    })?;

    ws.send(Message::Text(subscribe_message(&config.channel).into()))
        .await
        .map_err(|e| ChannelError::SubscribeFailed(e.to_string()))?;

    Ok(ws)
}

async fn read_loop(
    ws: &mut WsStream,
    stats: &ChannelStats,
    signal_tx: &mpsc::Sender<ChannelSignal>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> LoopExit {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender means the handle is gone.
                if changed.is_err() || *shutdown_rx.borrow() {
                    return LoopExit::Shutdown;
                }
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match parse_frame(text.as_str()) {
                            Ok(event) => {
                                debug!(id = %event.id, kind = %event.kind, revision = %event.revision, "event received");
                                if signal_tx.send(ChannelSignal::Event(event)).await.is_err() {
                                    info!("signal receiver dropped, closing channel");
                                    return LoopExit::ReceiverGone;
                                }
                            }
                            Err(e) => {
                                stats.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                                warn!(error = %e, "malformed frame dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (reason, code) = match frame {
                            Some(f) => (f.reason.to_string(), Some(f.code.into())),
                            None => ("closed by peer".to_string(), None),
                        };
                        return LoopExit::Disconnected(ChannelError::ConnectionClosed {
                            reason,
                            code,
                        });
                    }
                    Some(Ok(_)) => {
                        // Binary/ping/pong frames carry no events.
                    }
                    Some(Err(e)) => {
                        return LoopExit::Disconnected(ChannelError::WebSocketError(e.to_string()));
                    }
                    None => {
                        return LoopExit::Disconnected(ChannelError::ConnectionClosed {
                            reason: "stream ended without close frame".to_string(),
                            code: None,
                        });
                    }
                }
            }
        }
    }
}
