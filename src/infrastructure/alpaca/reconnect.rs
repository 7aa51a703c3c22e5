//! Reconnect Backoff
//!
//! Delay schedule for re-establishing a dropped stream connection. The
//! delay for attempt `k` is `base * growth^(k-1)`, capped at the
//! configured maximum; with the defaults (1s base, 2.0 growth, 30s cap)
//! that is 1s, 2s, 4s, 8s, 16s, 30s, 30s, ... for up to 10 attempts.

use std::time::Duration;

use rand::Rng;

/// Backoff schedule parameters.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Ceiling applied to every computed delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts.
    pub growth: f64,
    /// Randomization fraction applied to each delay (0.0 disables it).
    pub jitter: f64,
    /// Attempts allowed before giving up (0 means unlimited).
    pub attempt_limit: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            growth: 2.0,
            jitter: 0.0,
            attempt_limit: 10,
        }
    }
}

impl ReconnectConfig {
    /// Build the schedule from [`WebSocketSettings`].
    ///
    /// [`WebSocketSettings`]: crate::infrastructure::config::WebSocketSettings
    #[must_use]
    pub const fn from_websocket_settings(
        settings: &crate::infrastructure::config::WebSocketSettings,
    ) -> Self {
        Self {
            base_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            growth: settings.reconnect_delay_multiplier,
            jitter: settings.reconnect_jitter,
            attempt_limit: settings.max_reconnect_attempts,
        }
    }
}

/// Tracks reconnection attempts and hands out backoff delays.
///
/// The policy is reset after every successful authentication so a
/// connection that later drops starts the schedule from the beginning.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy with zero attempts recorded.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Record an attempt and return the delay to wait before it, or
    /// `None` once the attempt limit is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        // The exponent saturates well below any overflow; the cap
        // dominates long before 2^31 seconds anyway.
        let exponent = i32::try_from(self.attempts.min(31)).unwrap_or(31);
        self.attempts += 1;

        let scaled = self.config.base_delay.as_secs_f64() * self.config.growth.powi(exponent);
        let capped = if scaled.is_finite() {
            scaled.min(self.config.max_delay.as_secs_f64())
        } else {
            self.config.max_delay.as_secs_f64()
        };

        Some(self.with_jitter(Duration::from_secs_f64(capped.max(0.0))))
    }

    /// Forget all recorded attempts.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts recorded since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is still allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.attempt_limit == 0 || self.attempts < self.config.attempt_limit
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter <= 0.0 {
            return delay;
        }

        let spread = delay.as_secs_f64() * self.config.jitter;
        let offset: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.001))
    }
}
