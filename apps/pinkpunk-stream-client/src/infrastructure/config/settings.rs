//! Client Configuration Settings
//!
//! Configuration types for the feed client, loaded from environment
//! variables. Every variable is optional; code defaults match the feed's
//! production contract.

use std::time::Duration;

/// Default trending feed endpoint.
const DEFAULT_FEED_URL: &str = "wss://web-t.pinkpunk.io/ws";

/// Default chain identifier (BNB Smart Chain).
const DEFAULT_CHAIN_ID: &str = "56";

/// Feed endpoint settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Chain identifier carried on subscribe and ping payloads.
    pub chain_id: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Window after each ping in which a pong must be observed.
    pub heartbeat_timeout: Duration,
    /// Base reconnection delay, multiplied by the attempt number.
    pub reconnect_base_delay: Duration,
    /// Maximum reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            reconnect_base_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Feed endpoint settings.
    pub feed: FeedSettings,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
}

impl ClientSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TRENDING_FEED_URL` is set to something other
    /// than a `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("TRENDING_FEED_URL")
            .unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(ConfigError::InvalidUrl(url));
        }

        let chain_id = std::env::var("TRENDING_CHAIN_ID")
            .unwrap_or_else(|_| DEFAULT_CHAIN_ID.to_string());

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            heartbeat_interval: parse_env_duration_secs(
                "TRENDING_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                "TRENDING_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout,
            ),
            reconnect_base_delay: parse_env_duration_millis(
                "TRENDING_RECONNECT_DELAY_MS",
                defaults.reconnect_base_delay,
            ),
            max_reconnect_attempts: parse_env_u32(
                "TRENDING_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        Ok(Self {
            feed: FeedSettings { url, chain_id },
            websocket,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The endpoint URL is not a WebSocket URL.
    #[error("TRENDING_FEED_URL must be a ws:// or wss:// URL, got: {0}")]
    InvalidUrl(String),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
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
