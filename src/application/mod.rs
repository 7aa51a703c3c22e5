//! Application Layer - Client facade and transport ports.
//!
//! This layer exposes the public [`StreamClient`](client::StreamClient)
//! API and defines the port traits the infrastructure layer implements.

/// Stream client facade and session guard.
pub mod client;

/// Transport port traits.
pub mod ports;
