//! Stream Codec
//!
//! JSON decoding for Alpaca's market data stream. The server batches
//! messages into JSON arrays; each element carries a `T` discriminator.
//! Control messages occasionally arrive as a bare object.
//!
//! Decoding is lenient at the record level: a record that is malformed
//! or of an unknown type is logged and skipped so one bad record never
//! takes down the stream. Only an unparseable envelope is an error.

use crate::domain::streaming::{BarData, QuoteData, TradeData};
use crate::infrastructure::alpaca::messages::{ErrorMessage, SubscriptionMessage, SuccessMessage};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded inbound stream message.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Connection/authentication acknowledgment
    Success(SuccessMessage),

    /// Error response
    Error(ErrorMessage),

    /// Subscription state echo
    Subscription(SubscriptionMessage),

    /// Real-time quote
    Quote(QuoteData),

    /// Real-time trade
    Trade(TradeData),

    /// Minute bar
    Bar(BarData),
}

/// JSON codec for the market data stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into inbound messages.
    ///
    /// Malformed or unknown records within the envelope are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope itself is not valid JSON or is
    /// neither an array nor an object.
    pub fn decode(&self, text: &str) -> Result<Vec<InboundMessage>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            let records: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
            Ok(records
                .into_iter()
                .filter_map(|record| Self::decode_record(&record))
                .collect())
        } else if trimmed.starts_with('{') {
            let record: serde_json::Value = serde_json::from_str(trimmed)?;
            Ok(Self::decode_record(&record).into_iter().collect())
        } else {
            Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )))
        }
    }

    /// Encode a value to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode one record by its `T` discriminator. Returns `None` for
    /// records that cannot be decoded.
    fn decode_record(record: &serde_json::Value) -> Option<InboundMessage> {
        let Some(msg_type) = record.get("T").and_then(serde_json::Value::as_str) else {
            tracing::warn!("dropping record without a type discriminator");
            return None;
        };

        let decoded = match msg_type {
            "success" => serde_json::from_value(record.clone())
                .map(InboundMessage::Success)
                .map_err(CodecError::from),
            "error" => serde_json::from_value(record.clone())
                .map(InboundMessage::Error)
                .map_err(CodecError::from),
            "subscription" => serde_json::from_value(record.clone())
                .map(InboundMessage::Subscription)
                .map_err(CodecError::from),
            "q" => QuoteData::from_wire(record)
                .map(InboundMessage::Quote)
                .map_err(|e| CodecError::InvalidFormat(e.to_string())),
            "t" => TradeData::from_wire(record)
                .map(InboundMessage::Trade)
                .map_err(|e| CodecError::InvalidFormat(e.to_string())),
            "b" => BarData::from_wire(record)
                .map(InboundMessage::Bar)
                .map_err(|e| CodecError::InvalidFormat(e.to_string())),
            other => {
                tracing::debug!(msg_type = other, "skipping unhandled message type");
                return None;
            }
        };

        match decoded {
            Ok(message) => Some(message),
            Err(error) => {
                tracing::warn!(msg_type, %error, "dropping malformed record");
                None
            }
        }
    }
}
