//! Alpaca Stream Protocol
//!
//! Everything specific to Alpaca's market data WebSocket protocol: wire
//! message types, the JSON codec, authentication, heartbeat, the
//! reconnection policy, and the connection driver that ties them
//! together over a transport port.

pub mod auth;
pub mod codec;
pub mod connection;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
