//! In-memory transport fake for exercising the client end to end
//! without a network.

#![allow(clippy::unwrap_used, dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use alpaca_stream::{
    TransportConnector, TransportError, TransportMessage, TransportSink, TransportStream,
};

/// Install a test subscriber so failing tests carry the driver's
/// structured logs. Safe to call from every test; later calls no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("alpaca_stream=debug")),
        )
        .with_test_writer()
        .try_init();
}

type InboundSender = mpsc::UnboundedSender<Result<TransportMessage, TransportError>>;

/// Scripted transport connector.
///
/// Records every outbound text frame, optionally replies to auth
/// requests with an authenticated acknowledgment, and lets tests
/// inject inbound frames or kill the live connection.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<MockState>,
}

struct MockState {
    auto_authenticate: bool,
    sent: Mutex<Vec<String>>,
    fail_connects: AtomicUsize,
    connect_count: AtomicUsize,
    current: Mutex<Option<InboundSender>>,
}

impl MockConnector {
    /// Connector that acknowledges every auth request.
    pub fn new() -> Self {
        Self::with_auto_authenticate(true)
    }

    /// Connector that never acknowledges authentication.
    pub fn silent() -> Self {
        Self::with_auto_authenticate(false)
    }

    fn with_auto_authenticate(auto_authenticate: bool) -> Self {
        Self {
            state: Arc::new(MockState {
                auto_authenticate,
                sent: Mutex::new(Vec::new()),
                fail_connects: AtomicUsize::new(0),
                connect_count: AtomicUsize::new(0),
                current: Mutex::new(None),
            }),
        }
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.state.fail_connects.store(count, Ordering::SeqCst);
    }

    /// Number of successful connections so far.
    pub fn connect_count(&self) -> usize {
        self.state.connect_count.load(Ordering::SeqCst)
    }

    /// All outbound text frames, across all connections.
    pub fn sent_texts(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    /// Inject an inbound text frame into the live connection.
    pub fn inject(&self, text: &str) {
        let guard = self.state.current.lock().unwrap();
        let sender = guard.as_ref().expect("no live connection");
        sender
            .send(Ok(TransportMessage::Text(text.to_string())))
            .unwrap();
    }

    /// Drop the live connection, as if the server went away.
    pub fn drop_connection(&self) {
        self.state.current.lock().unwrap().take();
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>), TransportError> {
        let failures = self.state.fail_connects.load(Ordering::SeqCst);
        if failures > 0 {
            self.state.fail_connects.store(failures - 1, Ordering::SeqCst);
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        self.state.connect_count.fetch_add(1, Ordering::SeqCst);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        *self.state.current.lock().unwrap() = Some(inbound_tx);

        Ok((
            Box::new(MockSink {
                state: Arc::clone(&self.state),
            }),
            Box::new(MockStream { rx: inbound_rx }),
        ))
    }
}

struct MockSink {
    state: Arc<MockState>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, message: TransportMessage) -> Result<(), TransportError> {
        if let TransportMessage::Text(text) = message {
            let is_auth = text.contains(r#""action":"auth""#);
            self.state.sent.lock().unwrap().push(text);

            if is_auth && self.state.auto_authenticate {
                // Reply through the live connection; the sender is the
                // only handle, so dropping it elsewhere ends the stream.
                let guard = self.state.current.lock().unwrap();
                if let Some(sender) = guard.as_ref() {
                    let _ = sender.send(Ok(TransportMessage::Text(
                        r#"[{"T":"success","msg":"connected"}]"#.to_string(),
                    )));
                    let _ = sender.send(Ok(TransportMessage::Text(
                        r#"[{"T":"success","msg":"authenticated"}]"#.to_string(),
                    )));
                }
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Result<TransportMessage, TransportError>>,
}

#[async_trait]
impl TransportStream for MockStream {
    async fn next(&mut self) -> Option<Result<TransportMessage, TransportError>> {
        self.rx.recv().await
    }
}
