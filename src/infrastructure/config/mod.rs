//! Configuration Module
//!
//! Settings types and environment loading for the stream client.

mod settings;

pub use settings::{ConfigError, DataFeed, Environment, StreamConfig, WebSocketSettings};
