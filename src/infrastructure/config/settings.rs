//! Stream Client Configuration Settings
//!
//! Configuration types for the stream client, optionally loaded from
//! environment variables.

use std::time::Duration;

use crate::infrastructure::alpaca::auth::{AUTH_TIMEOUT, AuthError, Credentials};

/// Which market data feed the stream serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFeed {
    /// IEX exchange data, available on the free tier.
    #[default]
    Iex,
    /// Consolidated SIP data, requires a paid subscription.
    Sip,
    /// Over-the-counter data.
    Otc,
}

impl DataFeed {
    /// Parse a feed name; unrecognized values fall back to IEX.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sip" => Self::Sip,
            "otc" => Self::Otc,
            _ => Self::Iex,
        }
    }

    /// Feed segment of the stream URL path.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Iex => "iex",
            Self::Sip => "sip",
            Self::Otc => "otc",
        }
    }
}

/// Trading environment (paper vs live).
///
/// Market data streams always use production endpoints, so the
/// environment does not affect the stream URL. It is carried for
/// logging and for callers that pair the stream with trading APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Simulated trading.
    #[default]
    Paper,
    /// Real-money trading.
    Live,
}

impl Environment {
    /// Parse an environment name; unrecognized values fall back to
    /// paper.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "LIVE" => Self::Live,
            _ => Self::Paper,
        }
    }

    /// Whether this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Environment name for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}

/// Timing knobs for the WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Deadline for the authentication acknowledgment after connect.
    pub auth_timeout: Duration,
    /// Spacing between heartbeat pings.
    pub heartbeat_interval: Duration,
    /// Grace period for an unanswered heartbeat ping.
    pub heartbeat_timeout: Duration,
    /// Backoff delay before the first reconnection attempt.
    pub reconnect_delay_initial: Duration,
    /// Ceiling on the backoff delay.
    pub reconnect_delay_max: Duration,
    /// Backoff growth factor between attempts.
    pub reconnect_delay_multiplier: f64,
    /// Randomization fraction on backoff delays (0.0 disables it).
    pub reconnect_jitter: f64,
    /// Reconnection attempts before giving up (0 means unlimited).
    pub max_reconnect_attempts: u32,
    /// How long disconnect waits for the driver task to stop.
    pub shutdown_timeout: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            auth_timeout: AUTH_TIMEOUT,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 10,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Complete stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Trading environment.
    pub environment: Environment,
    /// Market data feed type.
    pub feed: DataFeed,
    /// API credentials.
    pub credentials: Credentials,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
}

impl StreamConfig {
    /// Create a configuration with defaults for everything except
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or secret is empty.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::default(),
            feed: DataFeed::default(),
            credentials: Credentials::new(key, secret)?,
            websocket: WebSocketSettings::default(),
        })
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `ALPACA_KEY` and `ALPACA_SECRET` (required), plus
    /// `ALPACA_ENV`, `ALPACA_FEED`, and `ALPACA_STREAM_*` overrides for
    /// the WebSocket settings.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing
    /// or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = Credentials::from_env()?;

        let environment = std::env::var("ALPACA_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let feed = std::env::var("ALPACA_FEED")
            .map(|s| DataFeed::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            auth_timeout: parse_env_duration_secs("ALPACA_STREAM_AUTH_TIMEOUT_SECS", defaults.auth_timeout),
            heartbeat_interval: parse_env_duration_secs(
                "ALPACA_STREAM_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                "ALPACA_STREAM_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "ALPACA_STREAM_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "ALPACA_STREAM_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "ALPACA_STREAM_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_env_f64("ALPACA_STREAM_RECONNECT_JITTER", defaults.reconnect_jitter),
            max_reconnect_attempts: parse_env_u32(
                "ALPACA_STREAM_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            shutdown_timeout: parse_env_duration_secs(
                "ALPACA_STREAM_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout,
            ),
        };

        Ok(Self {
            environment,
            feed,
            credentials,
            websocket,
        })
    }

    /// Get the market data stream WebSocket URL.
    ///
    /// Market data streams always use production URLs regardless of
    /// trading environment.
    #[must_use]
    pub fn stream_url(&self) -> String {
        format!("wss://stream.data.alpaca.markets/v2/{}", self.feed.as_str())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Credentials are missing or invalid.
    #[error(transparent)]
    Credentials(#[from] AuthError),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
