//! Transport Ports
//!
//! Traits decoupling the connection driver from any concrete WebSocket
//! library. The production implementation lives in
//! [`crate::infrastructure::websocket`]; tests substitute in-memory
//! fakes.

use async_trait::async_trait;

// =============================================================================
// Messages
// =============================================================================

/// A transport-level frame, independent of the underlying library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    /// UTF-8 text payload.
    Text(String),
    /// Ping control frame.
    Ping(Vec<u8>),
    /// Pong control frame.
    Pong(Vec<u8>),
    /// Close frame from the peer.
    Close,
}

// =============================================================================
// Errors
// =============================================================================

/// Failures surfaced by a transport implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A frame could not be sent.
    #[error("send failed: {0}")]
    Send(String),

    /// The connection closed while reading.
    #[error("connection closed")]
    Closed,

    /// The peer violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

// =============================================================================
// Ports
// =============================================================================

/// Write half of an established connection.
#[async_trait]
pub trait TransportSink: Send {
    /// Send one frame.
    async fn send(&mut self, message: TransportMessage) -> Result<(), TransportError>;

    /// Initiate a graceful close.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an established connection.
#[async_trait]
pub trait TransportStream: Send {
    /// Next inbound frame. `None` means the stream ended.
    async fn next(&mut self) -> Option<Result<TransportMessage, TransportError>>;
}

/// Factory for establishing connections.
///
/// One connector is held for the lifetime of a client; every
/// (re)connection attempt goes through it.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a connection to `url` and return its split halves.
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>), TransportError>;
}
