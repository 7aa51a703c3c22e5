//! Domain Layer - Core streaming types and subscription state.
//!
//! This layer contains the core domain types for market data streaming
//! with no transport dependencies. All types here are pure Rust with
//! serialization support.

/// Market data streaming types (quotes, trades, bars).
pub mod streaming;

/// Subscription tracking and handler registration.
pub mod subscription;
