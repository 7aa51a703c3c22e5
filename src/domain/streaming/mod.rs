//! Market Data Streaming Types
//!
//! Typed models for real-time market data: quotes, trades, and bars.
//! Each model is parsed from a loosely-typed wire record using Alpaca's
//! short field names (`S` symbol, `t` timestamp, `bp` bid price, ...).
//!
//! # Missing-Field Semantics
//!
//! The stream omits fields it has no value for, so every optional field
//! defaults when absent: numeric fields to zero, strings to empty,
//! condition lists to empty. Parsing fails only when the record is not a
//! structured object at all, or the timestamp is present but not a valid
//! RFC-3339 instant. A missing timestamp defaults to the Unix epoch.
//!
//! Symbols are taken verbatim from the wire; case normalization belongs
//! to subscription handling, not parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Error Type
// =============================================================================

/// Error parsing a wire record into a typed model.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The record could not be interpreted as a structured object, or a
    /// present field had an unusable value (e.g. a malformed timestamp).
    #[error("malformed wire record: {0}")]
    Malformed(#[from] serde_json::Error),
}

// =============================================================================
// Channels
// =============================================================================

/// A market data channel on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// NBBO quote updates.
    Quotes,
    /// Trade prints.
    Trades,
    /// Minute bars (OHLCV).
    Bars,
}

impl Channel {
    /// All channels, in protocol order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Quotes, Self::Trades, Self::Bars]
    }

    /// Channel name as used in subscribe/unsubscribe messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Trades => "trades",
            Self::Bars => "bars",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Models
// =============================================================================

/// Real-time quote (NBBO) update.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "T": "q",
///   "S": "AMD",
///   "bx": "U",
///   "bp": 87.66,
///   "bs": 1,
///   "ax": "Q",
///   "ap": 87.68,
///   "as": 4,
///   "t": "2021-02-22T15:51:45.335689322Z",
///   "c": ["R"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    /// Ticker symbol, vendor-canonical case.
    #[serde(rename = "S", default)]
    pub symbol: String,

    /// Quote timestamp.
    #[serde(rename = "t", default)]
    pub timestamp: DateTime<Utc>,

    /// Bid price.
    #[serde(rename = "bp", default)]
    pub bid_price: f64,

    /// Bid size.
    #[serde(rename = "bs", default)]
    pub bid_size: i32,

    /// Ask price.
    #[serde(rename = "ap", default)]
    pub ask_price: f64,

    /// Ask size.
    #[serde(rename = "as", default)]
    pub ask_size: i32,

    /// Bid exchange code.
    #[serde(rename = "bx", default)]
    pub bid_exchange: String,

    /// Ask exchange code.
    #[serde(rename = "ax", default)]
    pub ask_exchange: String,

    /// Quote condition codes.
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,
}

impl QuoteData {
    /// Parse a quote from a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the record is not a structured object or
    /// carries an invalid timestamp. Missing optional fields default.
    pub fn from_wire(record: &serde_json::Value) -> Result<Self, ParseError> {
        Ok(serde_json::from_value(record.clone())?)
    }
}

/// Real-time trade print.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "T": "t",
///   "i": 96921,
///   "S": "AAPL",
///   "x": "D",
///   "p": 126.55,
///   "s": 1,
///   "t": "2021-02-22T15:51:44.208Z",
///   "c": ["@", "I"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    /// Ticker symbol, vendor-canonical case.
    #[serde(rename = "S", default)]
    pub symbol: String,

    /// Trade timestamp.
    #[serde(rename = "t", default)]
    pub timestamp: DateTime<Utc>,

    /// Trade price.
    #[serde(rename = "p", default)]
    pub price: f64,

    /// Trade size (shares).
    #[serde(rename = "s", default)]
    pub size: i32,

    /// Exchange code where the trade executed.
    #[serde(rename = "x", default)]
    pub exchange: String,

    /// Trade ID, stringified from the numeric wire field.
    #[serde(rename = "i", default, deserialize_with = "stringify")]
    pub trade_id: String,

    /// Trade condition codes.
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,
}

impl TradeData {
    /// Parse a trade from a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the record is not a structured object or
    /// carries an invalid timestamp. Missing optional fields default.
    pub fn from_wire(record: &serde_json::Value) -> Result<Self, ParseError> {
        Ok(serde_json::from_value(record.clone())?)
    }
}

/// Real-time bar (OHLCV) update.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "T": "b",
///   "S": "SPY",
///   "o": 388.985,
///   "h": 389.13,
///   "l": 388.975,
///   "c": 389.12,
///   "v": 49378,
///   "n": 461,
///   "vw": 389.062639,
///   "t": "2021-02-22T19:15:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    /// Ticker symbol, vendor-canonical case.
    #[serde(rename = "S", default)]
    pub symbol: String,

    /// Bar timestamp (start of the bar period).
    #[serde(rename = "t", default)]
    pub timestamp: DateTime<Utc>,

    /// Open price.
    #[serde(rename = "o", default)]
    pub open: f64,

    /// High price.
    #[serde(rename = "h", default)]
    pub high: f64,

    /// Low price.
    #[serde(rename = "l", default)]
    pub low: f64,

    /// Close price.
    #[serde(rename = "c", default)]
    pub close: f64,

    /// Volume (shares).
    #[serde(rename = "v", default)]
    pub volume: i64,

    /// Number of trades in the bar.
    #[serde(rename = "n", default)]
    pub trade_count: i32,

    /// Volume-weighted average price.
    #[serde(rename = "vw", default)]
    pub vwap: f64,
}

impl BarData {
    /// Parse a bar from a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the record is not a structured object or
    /// carries an invalid timestamp. Missing optional fields default.
    pub fn from_wire(record: &serde_json::Value) -> Result<Self, ParseError> {
        Ok(serde_json::from_value(record.clone())?)
    }
}

// =============================================================================
// Message Envelope
// =============================================================================

/// A typed market data message, discriminated by channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Quote update.
    Quote(QuoteData),
    /// Trade print.
    Trade(TradeData),
    /// Bar update.
    Bar(BarData),
}

impl StreamMessage {
    /// Symbol the message refers to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote(q) => &q.symbol,
            Self::Trade(t) => &t.symbol,
            Self::Bar(b) => &b.symbol,
        }
    }

    /// Message timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Quote(q) => q.timestamp,
            Self::Trade(t) => t.timestamp,
            Self::Bar(b) => b.timestamp,
        }
    }

    /// Channel this message belongs to.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Quote(_) => Channel::Quotes,
            Self::Trade(_) => Channel::Trades,
            Self::Bar(_) => Channel::Bars,
        }
    }
}

/// Deserialize a wire value of any scalar type into a string.
///
/// Trade IDs arrive as integers on the wire but are exposed as strings.
fn stringify<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
