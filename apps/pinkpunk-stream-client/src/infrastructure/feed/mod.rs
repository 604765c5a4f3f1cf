//! Trending Feed Protocol Handler
//!
//! WebSocket client for the trending token feed: connection lifecycle,
//! heartbeat keepalive, reconnection with linear backoff, dual-encoding
//! frame decoding, and the subscribe/ping/pong control protocol.

/// Connection manager and consumer-facing contract.
pub mod client;
/// Dual-encoding frame decoder.
pub mod codec;
/// Ping interval and pong timeout monitoring.
pub mod heartbeat;
/// Wire message types and control payload builders.
pub mod messages;
/// Wire record to domain record mapping.
pub mod normalize;
/// Linear backoff reconnection policy.
pub mod reconnect;

pub use client::{ConnectionState, FeedError, TrendingClient, TrendingClientConfig};
pub use codec::DecodeError;
pub use heartbeat::HeartbeatConfig;
pub use reconnect::ReconnectConfig;
