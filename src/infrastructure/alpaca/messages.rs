//! Alpaca WebSocket Message Types
//!
//! Wire format types for Alpaca's market data stream. All inbound
//! messages carry a `T` field discriminating the message type; the
//! server batches them into JSON arrays.
//!
//! # Message Types
//!
//! ## Control Messages
//! - `Success`: Connection and authentication acknowledgments
//! - `Error`: Error response with code and message
//! - `Subscription`: Echo of the active subscription state
//!
//! ## Data Messages
//! - `q`: Real-time quotes
//! - `t`: Real-time trades
//! - `b`: Minute bars (OHLCV)
//!
//! # References
//!
//! - [Stock Streaming](https://docs.alpaca.markets/docs/real-time-stock-pricing-data)

use serde::{Deserialize, Serialize};

use crate::domain::streaming::Channel;

// =============================================================================
// Control Messages
// =============================================================================

/// Acknowledgment for the connection and authentication steps.
///
/// Arrives as `{"T":"success","msg":"connected"}` right after the
/// transport opens, then `{"T":"success","msg":"authenticated"}` once
/// the handshake completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    /// Discriminator, always `"success"`.
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Which step the server is acknowledging.
    pub msg: SuccessKind,
}

/// The two acknowledgments the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessKind {
    /// The transport connection is accepted.
    Connected,
    /// The key/secret handshake succeeded.
    Authenticated,
}

/// Error record, e.g. `{"T":"error","code":401,"msg":"not authenticated"}`.
///
/// Codes 400-404 cover syntax and authentication problems, 405-408
/// cover quota and throughput limits, 500 is an internal server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Discriminator, always `"error"`.
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Vendor error code.
    pub code: i32,

    /// Vendor error text.
    pub msg: String,
}

impl ErrorMessage {
    /// Whether the code belongs to the authentication range.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.code, 401..=404)
    }

    /// Whether the code belongs to the quota/throughput range.
    #[must_use]
    pub const fn is_rate_limit_error(&self) -> bool {
        matches!(self.code, 405..=407)
    }
}

/// Echo of the full active subscription state.
///
/// The server sends one after every subscribe/unsubscribe action, e.g.
/// `{"T":"subscription","trades":["AAPL"],"quotes":["AMD"],"bars":[]}`.
/// Channels with no symbols may be omitted entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// Discriminator, always `"subscription"`.
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Active trade symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<String>,

    /// Active quote symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<String>,

    /// Active bar symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bars: Vec<String>,
}

// =============================================================================
// Outbound Messages (Client -> Server)
// =============================================================================

/// The auth action: `{"action":"auth","key":...,"secret":...}`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    /// Always `"auth"`.
    pub action: &'static str,

    /// API key.
    pub key: String,

    /// API secret.
    pub secret: String,
}

impl AuthRequest {
    /// Build the auth action for a key/secret pair.
    #[must_use]
    pub const fn new(key: String, secret: String) -> Self {
        Self {
            action: "auth",
            key,
            secret,
        }
    }
}

/// A subscribe or unsubscribe action naming symbols per channel.
///
/// Empty channels are left off the wire.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscriptionRequest {
    /// `"subscribe"` or `"unsubscribe"`.
    pub action: &'static str,

    /// Trade symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<String>,

    /// Quote symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<String>,

    /// Bar symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bars: Vec<String>,
}

impl SubscriptionRequest {
    /// An empty subscribe action.
    #[must_use]
    pub fn subscribe() -> Self {
        Self {
            action: "subscribe",
            ..Default::default()
        }
    }

    /// An empty unsubscribe action.
    #[must_use]
    pub fn unsubscribe() -> Self {
        Self {
            action: "unsubscribe",
            ..Default::default()
        }
    }

    /// Name the symbols for one channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel, symbols: Vec<String>) -> Self {
        match channel {
            Channel::Quotes => self.quotes = symbols,
            Channel::Trades => self.trades = symbols,
            Channel::Bars => self.bars = symbols,
        }
        self
    }

    /// Name quote symbols.
    #[must_use]
    pub fn with_quotes(self, symbols: Vec<String>) -> Self {
        self.with_channel(Channel::Quotes, symbols)
    }

    /// Name trade symbols.
    #[must_use]
    pub fn with_trades(self, symbols: Vec<String>) -> Self {
        self.with_channel(Channel::Trades, symbols)
    }

    /// Name bar symbols.
    #[must_use]
    pub fn with_bars(self, symbols: Vec<String>) -> Self {
        self.with_channel(Channel::Bars, symbols)
    }

    /// Whether the request names any symbols at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.quotes.is_empty() && self.bars.is_empty()
    }
}
