//! WebSocket Transport Adapter
//!
//! Implements the transport ports over tokio-tungstenite. This is the
//! only module that touches the WebSocket library; everything above it
//! speaks [`TransportMessage`].

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    TransportConnector, TransportError, TransportMessage, TransportSink, TransportStream,
};

type WsStreamInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector establishing TLS WebSocket connections.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for WebSocketConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>), TransportError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();
        Ok((
            Box::new(WsSink { inner: write }),
            Box::new(WsStream { inner: read }),
        ))
    }
}

/// Write half of a tungstenite connection.
struct WsSink {
    inner: SplitSink<WsStreamInner, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, message: TransportMessage) -> Result<(), TransportError> {
        let frame = match message {
            TransportMessage::Text(text) => Message::Text(text.into()),
            TransportMessage::Ping(data) => Message::Ping(data.into()),
            TransportMessage::Pong(data) => Message::Pong(data.into()),
            TransportMessage::Close => Message::Close(None),
        };

        self.inner
            .send(frame)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Read half of a tungstenite connection.
struct WsStream {
    inner: SplitStream<WsStreamInner>,
}

#[async_trait]
impl TransportStream for WsStream {
    async fn next(&mut self) -> Option<Result<TransportMessage, TransportError>> {
        loop {
            return match self.inner.next().await? {
                Ok(Message::Text(text)) => Some(Ok(TransportMessage::Text(text.to_string()))),
                Ok(Message::Ping(data)) => Some(Ok(TransportMessage::Ping(data.to_vec()))),
                Ok(Message::Pong(data)) => Some(Ok(TransportMessage::Pong(data.to_vec()))),
                Ok(Message::Close(_)) => Some(Ok(TransportMessage::Close)),
                // Binary and raw frames are not part of the protocol.
                Ok(_) => continue,
                Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => {
                    Some(Err(TransportError::Closed))
                }
                Err(e) => Some(Err(TransportError::Protocol(e.to_string()))),
            };
        }
    }
}
