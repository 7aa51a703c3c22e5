//! Stream Client Facade
//!
//! The public entry point for consuming Alpaca's real-time market data.
//! The client owns a subscription registry (the desired-state source of
//! truth) and a background connection driver task, and exposes a small
//! async API: connect, subscribe, unsubscribe, disconnect.
//!
//! Subscriptions may be registered before connecting; the driver
//! replays the registry on every successful authentication, so the
//! live connection always converges to the registered state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::TransportConnector;
use crate::domain::streaming::Channel;
use crate::domain::subscription::{BarHandler, QuoteHandler, SubscriptionRegistry, TradeHandler};
use crate::infrastructure::alpaca::auth::AuthError;
use crate::infrastructure::alpaca::connection::{
    Command, ConnectionDriver, ConnectionPhase, ConnectionState,
};
use crate::infrastructure::config::{ConfigError, StreamConfig};
use crate::infrastructure::websocket::WebSocketConnector;

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// Authentication did not complete within the allowed window.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
}

// =============================================================================
// Symbol Conversion
// =============================================================================

/// Conversion into a list of ticker symbols.
///
/// Lets the subscribe/unsubscribe methods accept a single symbol or a
/// collection interchangeably.
pub trait IntoSymbols {
    /// Convert into a symbol list.
    fn into_symbols(self) -> Vec<String>;
}

impl IntoSymbols for &str {
    fn into_symbols(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoSymbols for String {
    fn into_symbols(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoSymbols for Vec<String> {
    fn into_symbols(self) -> Vec<String> {
        self
    }
}

impl IntoSymbols for Vec<&str> {
    fn into_symbols(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoSymbols for &[String] {
    fn into_symbols(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoSymbols for &[&str] {
    fn into_symbols(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

impl<const N: usize> IntoSymbols for [&str; N] {
    fn into_symbols(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

// =============================================================================
// Stream Client
// =============================================================================

/// Handle to the running driver task.
struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Real-time market data stream client.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct StreamClient {
    config: StreamConfig,
    connector: Arc<dyn TransportConnector>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<ConnectionState>,
    inner: Mutex<Option<DriverHandle>>,
}

impl StreamClient {
    /// Create a client over the production WebSocket transport.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing
    /// or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(StreamConfig::from_env()?))
    }

    /// Create a client over a custom transport connector.
    #[must_use]
    pub fn with_connector(config: StreamConfig, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            config,
            connector,
            registry: Arc::new(SubscriptionRegistry::new()),
            state: Arc::new(ConnectionState::new()),
            inner: Mutex::new(None),
        }
    }

    /// The client configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Whether a transport connection is open (authenticated or not).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Whether the connection is authenticated and streaming.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Reconnection attempts since the last successful authentication.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.state.reconnect_attempts()
    }

    /// Whether the driver will keep reconnecting after a drop.
    ///
    /// Becomes false once the attempt limit is exhausted or after
    /// `disconnect`; exhaustion is never raised as an error, so this is
    /// how callers detect it.
    #[must_use]
    pub fn will_reconnect(&self) -> bool {
        self.state.should_reconnect()
    }

    /// Currently registered symbols on a channel, sorted.
    #[must_use]
    pub fn subscriptions(&self, channel: Channel) -> Vec<String> {
        self.registry.symbols(channel)
    }

    /// Connect to the stream and wait for authentication.
    ///
    /// A no-op if already authenticated. On failure the client is left
    /// cleanly disconnected; call `connect` again to retry.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the server does not confirm
    /// authentication within the configured window.
    pub async fn connect(&self) -> Result<(), StreamClientError> {
        if self.state.is_authenticated() {
            tracing::info!("already connected to stream");
            return Ok(());
        }

        // Replace any stale driver from a previous failed attempt.
        self.shutdown_driver().await;
        self.state.enable_reconnect();

        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = ConnectionDriver::new(
            self.config.stream_url(),
            self.config.credentials.clone(),
            self.config.websocket.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
            cancel.clone(),
        );

        let mut phase = self.state.watch_phase();
        let task = tokio::spawn(driver.run(command_rx));
        *self.inner.lock() = Some(DriverHandle {
            commands,
            cancel,
            task,
        });

        let authenticated = tokio::time::timeout(
            self.config.websocket.auth_timeout,
            phase.wait_for(|p| *p == ConnectionPhase::Authenticated),
        )
        .await;

        match authenticated {
            Ok(Ok(_)) => {
                tracing::info!(url = %self.config.stream_url(), "stream connected");
                Ok(())
            }
            Ok(Err(_)) | Err(_) => {
                tracing::error!(
                    timeout_secs = self.config.websocket.auth_timeout.as_secs(),
                    "authentication not confirmed in time"
                );
                // No driver survives a failed connect, so the flag
                // must not promise reconnection either.
                self.state.disable_reconnect();
                self.shutdown_driver().await;
                Err(StreamClientError::Authentication(AuthError::Timeout))
            }
        }
    }

    /// Disconnect from the stream.
    ///
    /// Disables reconnection, closes the connection, and waits for the
    /// driver task to finish. Handlers and registered symbols are kept;
    /// a later `connect` restores them. Idempotent.
    pub async fn disconnect(&self) {
        self.state.disable_reconnect();
        self.shutdown_driver().await;
        tracing::info!("disconnected from stream");
    }

    /// Open a session guard that disconnects when closed or dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connect fails.
    pub async fn session(&self) -> Result<StreamSession<'_>, StreamClientError> {
        self.connect().await?;
        Ok(StreamSession {
            client: self,
            closed: false,
        })
    }

    /// Subscribe to quotes for the given symbols.
    ///
    /// Symbols are uppercased; the handler is registered once per
    /// channel no matter how often the same `Arc` is passed. If
    /// authenticated, only the newly added symbols are sent to the
    /// server.
    pub fn subscribe_quotes<S: IntoSymbols>(&self, symbols: S, handler: QuoteHandler) {
        let added = self.registry.add_quotes(&symbols.into_symbols(), handler);
        self.send_subscribe(Channel::Quotes, added);
    }

    /// Subscribe to trades for the given symbols.
    pub fn subscribe_trades<S: IntoSymbols>(&self, symbols: S, handler: TradeHandler) {
        let added = self.registry.add_trades(&symbols.into_symbols(), handler);
        self.send_subscribe(Channel::Trades, added);
    }

    /// Subscribe to minute bars for the given symbols.
    pub fn subscribe_bars<S: IntoSymbols>(&self, symbols: S, handler: BarHandler) {
        let added = self.registry.add_bars(&symbols.into_symbols(), handler);
        self.send_subscribe(Channel::Bars, added);
    }

    /// Unsubscribe from quotes for the given symbols.
    ///
    /// Only symbols actually subscribed are sent to the server.
    /// Handlers stay registered.
    pub fn unsubscribe_quotes<S: IntoSymbols>(&self, symbols: S) {
        let removed = self.registry.remove_quotes(&symbols.into_symbols());
        self.send_unsubscribe(Channel::Quotes, removed);
    }

    /// Unsubscribe from trades for the given symbols.
    pub fn unsubscribe_trades<S: IntoSymbols>(&self, symbols: S) {
        let removed = self.registry.remove_trades(&symbols.into_symbols());
        self.send_unsubscribe(Channel::Trades, removed);
    }

    /// Unsubscribe from minute bars for the given symbols.
    pub fn unsubscribe_bars<S: IntoSymbols>(&self, symbols: S) {
        let removed = self.registry.remove_bars(&symbols.into_symbols());
        self.send_unsubscribe(Channel::Bars, removed);
    }

    /// Send the newly added symbols if the stream is authenticated.
    /// Otherwise the resubscription replay picks them up on connect.
    fn send_subscribe(&self, channel: Channel, symbols: Vec<String>) {
        if symbols.is_empty() || !self.state.is_authenticated() {
            return;
        }
        self.send_command(Command::Subscribe { channel, symbols });
    }

    /// Send the removed symbols if a connection is open.
    fn send_unsubscribe(&self, channel: Channel, symbols: Vec<String>) {
        if symbols.is_empty() || !self.state.is_connected() {
            return;
        }
        self.send_command(Command::Unsubscribe { channel, symbols });
    }

    fn send_command(&self, command: Command) {
        let guard = self.inner.lock();
        if let Some(handle) = guard.as_ref()
            && handle.commands.send(command).is_err()
        {
            tracing::debug!("stream driver not running, subscription deferred to reconnect");
        }
    }

    /// Stop the driver task and reset connection state.
    async fn shutdown_driver(&self) {
        let handle = self.inner.lock().take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if tokio::time::timeout(self.config.websocket.shutdown_timeout, handle.task)
                .await
                .is_err()
            {
                tracing::warn!("stream driver did not shut down within timeout");
            }
        }
        self.state.reset();
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        // Cannot await here; cancelling is enough to stop the task.
        self.state.disable_reconnect();
        if let Some(handle) = self.inner.lock().take() {
            handle.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("feed", &self.config.feed)
            .field("phase", &self.state.phase())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session Guard
// =============================================================================

/// Scoped connection guard returned by [`StreamClient::session`].
///
/// Prefer [`close`](Self::close) for a graceful shutdown; dropping the
/// guard still stops the driver but cannot wait for it.
pub struct StreamSession<'a> {
    client: &'a StreamClient,
    closed: bool,
}

impl StreamSession<'_> {
    /// Disconnect gracefully, consuming the guard.
    pub async fn close(mut self) {
        self.closed = true;
        self.client.disconnect().await;
    }
}

impl std::ops::Deref for StreamSession<'_> {
    type Target = StreamClient;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl Drop for StreamSession<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.client.state.disable_reconnect();
            if let Some(handle) = self.client.inner.lock().take() {
                handle.cancel.cancel();
            }
            self.client.state.reset();
        }
    }
}
