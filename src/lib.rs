#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value
    )
)]

//! Alpaca Stream - Real-Time Market Data Client
//!
//! A WebSocket client for Alpaca's real-time market data streams.
//! Maintains a persistent authenticated connection, tracks symbol
//! subscriptions across reconnects, and dispatches typed quote, trade,
//! and bar messages to registered handlers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming types and subscription state
//!   - `streaming`: Market data types (quotes, trades, bars)
//!   - `subscription`: Subscription registry and handler dispatch
//!
//! - **Application**: Public API and port definitions
//!   - `client`: The [`StreamClient`] facade
//!   - `ports`: Transport traits the infrastructure implements
//!
//! - **Infrastructure**: Protocol and transport adapters
//!   - `alpaca`: Wire messages, codec, auth, heartbeat, reconnection,
//!     and the connection driver
//!   - `websocket`: tokio-tungstenite transport adapter
//!   - `config`: Settings and environment loading
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use alpaca_stream::{StreamClient, StreamConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StreamClient::new(StreamConfig::new("key", "secret")?);
//!
//! client.subscribe_quotes(["AAPL", "MSFT"], Arc::new(|quote| {
//!     println!("{}: {} x {}", quote.symbol, quote.bid_price, quote.ask_price);
//! }));
//!
//! client.connect().await?;
//! // ... stream runs in the background ...
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no transport dependencies.
pub mod domain;

/// Application layer - Client facade and port definitions.
pub mod application;

/// Infrastructure layer - Protocol and transport adapters.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Client facade
pub use application::client::{IntoSymbols, StreamClient, StreamClientError, StreamSession};

// Domain types
pub use domain::streaming::{BarData, Channel, QuoteData, StreamMessage, TradeData};
pub use domain::subscription::{BarHandler, QuoteHandler, SubscriptionRegistry, TradeHandler};

// Configuration
pub use infrastructure::config::{
    ConfigError, DataFeed, Environment, StreamConfig, WebSocketSettings,
};

// Authentication
pub use infrastructure::alpaca::auth::{AuthError, Credentials};

// Connection observability
pub use infrastructure::alpaca::connection::{ConnectionPhase, ConnectionState};

// Transport ports (for custom transports and tests)
pub use application::ports::{
    TransportConnector, TransportError, TransportMessage, TransportSink, TransportStream,
};
