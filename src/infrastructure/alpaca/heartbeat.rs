//! Connection Liveness
//!
//! Ping/pong health monitoring for the stream connection. The monitor
//! never touches the socket itself: it asks the connection driver to
//! send pings over an event channel and watches a shared
//! [`LivenessTracker`] the driver updates on every inbound frame. A
//! ping that stays unanswered past the grace period produces a
//! [`HeartbeatEvent::Timeout`], which the driver turns into a
//! reconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Heartbeat timing parameters.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often to request a ping.
    pub interval: Duration,
    /// How long an unanswered ping may stay outstanding.
    pub grace: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            grace: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    /// Build the timing from [`WebSocketSettings`].
    ///
    /// [`WebSocketSettings`]: crate::infrastructure::config::WebSocketSettings
    #[must_use]
    pub const fn from_websocket_settings(
        settings: &crate::infrastructure::config::WebSocketSettings,
    ) -> Self {
        Self {
            interval: settings.heartbeat_interval,
            grace: settings.heartbeat_timeout,
        }
    }
}

/// Requests from the monitor to the connection driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a ping frame now.
    SendPing,
    /// The connection went silent; tear it down.
    Timeout,
}

/// Records when a ping went out and whether anything came back.
///
/// Any inbound frame counts as liveness, not just pong frames, so a
/// busy stream never pays for a missed control frame.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    outstanding_ping: Mutex<Option<Instant>>,
}

impl LivenessTracker {
    /// Create a tracker with no ping outstanding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that the driver sent a ping.
    pub fn ping_sent(&self) {
        let mut outstanding = self.outstanding_ping.lock();
        // Keep the oldest unanswered ping as the reference point.
        if outstanding.is_none() {
            *outstanding = Some(Instant::now());
        }
    }

    /// Note that a frame arrived; clears any outstanding ping.
    pub fn saw_traffic(&self) {
        *self.outstanding_ping.lock() = None;
    }

    /// Whether an outstanding ping has gone unanswered past `grace`.
    #[must_use]
    pub fn overdue(&self, grace: Duration) -> bool {
        self.outstanding_ping
            .lock()
            .is_some_and(|sent_at| sent_at.elapsed() > grace)
    }

    #[cfg(test)]
    fn force_outstanding_since(&self, ago: Duration) {
        if let Some(sent_at) = Instant::now().checked_sub(ago) {
            *self.outstanding_ping.lock() = Some(sent_at);
        }
    }
}

/// Periodic health check task, one per connection attempt.
///
/// Runs until cancelled, until the driver goes away, or until a
/// timeout is detected (at which point the monitor's job is done).
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    tracker: Arc<LivenessTracker>,
    events: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    /// Create a monitor over a shared tracker.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        tracker: Arc<LivenessTracker>,
        events: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            tracker,
            events,
            cancel,
        }
    }

    /// Run the monitoring loop.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("heartbeat monitor cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if self.tracker.overdue(self.config.grace) {
                        tracing::warn!(
                            grace_secs = self.config.grace.as_secs(),
                            "ping unanswered past grace period"
                        );
                        let _ = self.events.send(HeartbeatEvent::Timeout).await;
                        return;
                    }
                    if self.events.send(HeartbeatEvent::SendPing).await.is_err() {
                        tracing::debug!("heartbeat event channel closed");
                        return;
                    }
                }
            }
        }
    }
}
