//! Connection Driver
//!
//! Owns a live stream connection end to end: connecting through the
//! transport port, authenticating, heartbeating, relaying subscription
//! commands, dispatching inbound data, and reconnecting with backoff
//! when the connection drops.
//!
//! The driver runs as a single task. The client facade communicates
//! with it through a command channel and observes it through the shared
//! [`ConnectionState`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    TransportConnector, TransportError, TransportMessage, TransportSink,
};
use crate::domain::streaming::Channel;
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::alpaca::auth::{AuthError, Credentials};
use crate::infrastructure::alpaca::codec::{CodecError, InboundMessage, JsonCodec};
use crate::infrastructure::alpaca::heartbeat::{
    HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor, LivenessTracker,
};
use crate::infrastructure::alpaca::messages::{SubscriptionRequest, SuccessKind};
use crate::infrastructure::alpaca::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::infrastructure::config::WebSocketSettings;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle phase of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No connection and no driver running.
    #[default]
    Disconnected,
    /// Transport connection in progress.
    Connecting,
    /// Connected, authentication request sent.
    Authenticating,
    /// Authenticated and streaming.
    Authenticated,
    /// Connection lost, waiting to reconnect.
    Reconnecting,
}

/// Observable connection state shared between the driver and the
/// client facade.
#[derive(Debug)]
pub struct ConnectionState {
    phase: watch::Sender<ConnectionPhase>,
    should_reconnect: AtomicBool,
    reconnect_attempts: AtomicU32,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create state in the disconnected phase.
    #[must_use]
    pub fn new() -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::Disconnected);
        Self {
            phase,
            should_reconnect: AtomicBool::new(true),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.send_replace(phase);
    }

    /// Whether a transport connection is open (authenticated or not).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.phase(),
            ConnectionPhase::Authenticating | ConnectionPhase::Authenticated
        )
    }

    /// Whether the connection is authenticated and streaming.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase() == ConnectionPhase::Authenticated
    }

    /// Whether the driver should reconnect after a connection loss.
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        self.should_reconnect.load(Ordering::SeqCst)
    }

    pub(crate) fn enable_reconnect(&self) {
        self.should_reconnect.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disable_reconnect(&self) {
        self.should_reconnect.store(false, Ordering::SeqCst);
    }

    /// Number of reconnection attempts since the last successful
    /// authentication.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn set_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::SeqCst);
    }

    /// Reset to the disconnected phase with a zeroed attempt counter.
    pub(crate) fn reset(&self) {
        self.set_phase(ConnectionPhase::Disconnected);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Subscription commands sent from the facade to the driver.
#[derive(Debug, Clone)]
pub enum Command {
    /// Subscribe the symbols on a channel.
    Subscribe {
        /// Target channel.
        channel: Channel,
        /// Symbols to subscribe, already normalized.
        symbols: Vec<String>,
    },
    /// Unsubscribe the symbols on a channel.
    Unsubscribe {
        /// Target channel.
        channel: Channel,
        /// Symbols to unsubscribe, already normalized.
        symbols: Vec<String>,
    },
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that terminate one connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Codec failure on an outbound message.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The connection closed (close frame, EOF, or heartbeat timeout).
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Connection Driver
// =============================================================================

/// Drives the stream connection lifecycle.
pub struct ConnectionDriver {
    url: String,
    credentials: Credentials,
    settings: WebSocketSettings,
    connector: Arc<dyn TransportConnector>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<ConnectionState>,
    codec: JsonCodec,
    cancel: CancellationToken,
}

impl ConnectionDriver {
    /// Create a new driver.
    #[must_use]
    pub fn new(
        url: String,
        credentials: Credentials,
        settings: WebSocketSettings,
        connector: Arc<dyn TransportConnector>,
        registry: Arc<SubscriptionRegistry>,
        state: Arc<ConnectionState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url,
            credentials,
            settings,
            connector,
            registry,
            state,
            codec: JsonCodec::new(),
            cancel,
        }
    }

    /// Run the connection loop until cancelled, reconnection is
    /// disabled, or the attempt limit is exhausted.
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut policy =
            ReconnectPolicy::new(ReconnectConfig::from_websocket_settings(&self.settings));

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("stream driver cancelled");
                break;
            }

            match self.connect_and_run(&mut commands, &mut policy).await {
                Ok(()) => {
                    tracing::info!("stream connection closed gracefully");
                    break;
                }
                Err(error) => {
                    tracing::warn!(%error, "stream connection error");
                    self.state.set_phase(ConnectionPhase::Disconnected);

                    if !self.state.should_reconnect() {
                        break;
                    }

                    if let Some(delay) = policy.next_delay() {
                        let attempt = policy.attempt_count();
                        self.state.set_reconnect_attempts(attempt);
                        self.state.set_phase(ConnectionPhase::Reconnecting);
                        tracing::info!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            "reconnecting to stream"
                        );

                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                tracing::info!("stream driver cancelled during reconnect delay");
                                break;
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        tracing::error!(
                            attempts = policy.attempt_count(),
                            "maximum reconnection attempts exceeded, giving up"
                        );
                        self.state.disable_reconnect();
                        break;
                    }
                }
            }
        }

        self.state.set_phase(ConnectionPhase::Disconnected);
    }

    /// Connect, authenticate, and process traffic until an error or
    /// cancellation.
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), DriverError> {
        tracing::info!(url = %self.url, "connecting to stream");
        self.state.set_phase(ConnectionPhase::Connecting);

        let (mut sink, mut stream) = self.connector.connect(&self.url).await?;

        // Authenticate immediately; the server allows 10 seconds.
        let auth = self.codec.encode(&self.credentials.to_auth_request())?;
        sink.send(TransportMessage::Text(auth)).await?;
        self.state.set_phase(ConnectionPhase::Authenticating);

        let liveness = Arc::new(LivenessTracker::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(10);
        let heartbeat_cancel = self.cancel.child_token();
        // Stops the heartbeat task whenever this attempt ends.
        let _heartbeat_guard = heartbeat_cancel.clone().drop_guard();
        tokio::spawn(
            HeartbeatMonitor::new(
                HeartbeatConfig::from_websocket_settings(&self.settings),
                Arc::clone(&liveness),
                heartbeat_tx,
                heartbeat_cancel,
            )
            .run(),
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = sink.close().await;
                    return Ok(());
                }
                heartbeat_event = heartbeat_rx.recv() => {
                    match heartbeat_event {
                        Some(HeartbeatEvent::SendPing) => {
                            liveness.ping_sent();
                            sink.send(TransportMessage::Ping(Vec::new())).await?;
                        }
                        Some(HeartbeatEvent::Timeout) => {
                            tracing::warn!("heartbeat timeout");
                            return Err(DriverError::ConnectionClosed);
                        }
                        None => {
                            // The monitor only stops early after a
                            // timeout; a closed channel means this
                            // connection is no longer being watched.
                            tracing::warn!("heartbeat monitor stopped");
                            return Err(DriverError::ConnectionClosed);
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command, sink.as_mut()).await?,
                        None => {
                            // Facade dropped; nothing left to drive.
                            let _ = sink.close().await;
                            return Ok(());
                        }
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(TransportMessage::Text(text))) => {
                            liveness.saw_traffic();
                            self.handle_text(&text, sink.as_mut(), policy).await?;
                        }
                        Some(Ok(TransportMessage::Pong(_))) => {
                            liveness.saw_traffic();
                        }
                        Some(Ok(TransportMessage::Ping(data))) => {
                            sink.send(TransportMessage::Pong(data)).await?;
                        }
                        Some(Ok(TransportMessage::Close)) => {
                            tracing::info!("server sent close frame");
                            return Err(DriverError::ConnectionClosed);
                        }
                        Some(Err(error)) => return Err(error.into()),
                        None => {
                            tracing::info!("stream ended");
                            return Err(DriverError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Relay a subscription command to the server.
    async fn handle_command(
        &self,
        command: Command,
        sink: &mut dyn TransportSink,
    ) -> Result<(), DriverError> {
        let request = match command {
            Command::Subscribe { channel, symbols } => {
                SubscriptionRequest::subscribe().with_channel(channel, symbols)
            }
            Command::Unsubscribe { channel, symbols } => {
                SubscriptionRequest::unsubscribe().with_channel(channel, symbols)
            }
        };

        if request.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            action = request.action,
            quotes = ?request.quotes,
            trades = ?request.trades,
            bars = ?request.bars,
            "sending subscription request"
        );
        self.send_json(&request, sink).await
    }

    /// Handle a decoded text frame.
    async fn handle_text(
        &self,
        text: &str,
        sink: &mut dyn TransportSink,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), DriverError> {
        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable frame");
                return Ok(());
            }
        };

        for message in messages {
            match message {
                InboundMessage::Success(success) => match success.msg {
                    SuccessKind::Connected => {
                        tracing::debug!("stream connection acknowledged");
                    }
                    SuccessKind::Authenticated => {
                        tracing::info!("stream authenticated");
                        self.state.set_phase(ConnectionPhase::Authenticated);
                        self.state.set_reconnect_attempts(0);
                        policy.reset();
                        self.restore_subscriptions(sink).await?;
                    }
                },
                InboundMessage::Error(error) => {
                    // Protocol errors are logged, never raised: auth
                    // failures surface through the connect timeout.
                    if error.is_auth_error() {
                        let classified = AuthError::from(&error);
                        tracing::error!(code = error.code, %classified, "stream auth error");
                    } else {
                        tracing::error!(code = error.code, msg = %error.msg, "stream error");
                    }
                }
                InboundMessage::Subscription(sub) => {
                    tracing::debug!(
                        quotes = ?sub.quotes,
                        trades = ?sub.trades,
                        bars = ?sub.bars,
                        "subscription state confirmed"
                    );
                }
                InboundMessage::Quote(quote) => self.registry.dispatch_quote(&quote),
                InboundMessage::Trade(trade) => self.registry.dispatch_trade(&trade),
                InboundMessage::Bar(bar) => self.registry.dispatch_bar(&bar),
            }
        }

        Ok(())
    }

    /// Replay the registry's desired state after (re)authentication.
    async fn restore_subscriptions(&self, sink: &mut dyn TransportSink) -> Result<(), DriverError> {
        for (channel, symbols) in self.registry.snapshot() {
            tracing::info!(channel = %channel, count = symbols.len(), "restoring subscriptions");
            let request = SubscriptionRequest::subscribe().with_channel(channel, symbols);
            self.send_json(&request, sink).await?;
        }
        Ok(())
    }

    async fn send_json<T: serde::Serialize>(
        &self,
        value: &T,
        sink: &mut dyn TransportSink,
    ) -> Result<(), DriverError> {
        let json = self.codec.encode(value)?;
        sink.send(TransportMessage::Text(json)).await?;
        Ok(())
    }
}
