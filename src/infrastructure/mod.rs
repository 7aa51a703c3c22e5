//! Infrastructure Layer - Protocol, transport, and configuration.
//!
//! Concrete implementations behind the application-layer ports: the
//! Alpaca wire protocol, the tokio-tungstenite transport adapter, and
//! settings loading.

/// Alpaca stream protocol (messages, codec, auth, reconnect, heartbeat,
/// connection driver).
pub mod alpaca;

/// Configuration and settings.
pub mod config;

/// WebSocket transport adapter.
pub mod websocket;
