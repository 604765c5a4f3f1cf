#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! PinkPunk Stream Client - Trending Token Feed
//!
//! Maintains a single WebSocket connection to the PinkPunk trending feed
//! and republishes normalized token records to a registered consumer.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Consumer-facing record types
//!   - `token`: Normalized trending token records, percentage reconciliation
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket protocol handler (codec, heartbeat, reconnect,
//!     subscription protocol, connection manager, normalizer)
//!   - `config`: Environment-driven settings
//!   - `telemetry`: Tracing initialization
//!
//! # Data Flow
//!
//! ```text
//! trending feed WS ──► FrameDecoder ──► classify ──► normalize ──► on_message
//!        ▲                                │
//!        └── subscribe / ping / pong ◄────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Consumer-facing record types.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::token::{AGE_PLACEHOLDER, TrendingToken, normalize_percentage};

// Feed client
pub use infrastructure::feed::{
    ConnectionState, DecodeError, FeedError, HeartbeatConfig, ReconnectConfig, TrendingClient,
    TrendingClientConfig,
};

// Infrastructure config
pub use infrastructure::config::{ClientSettings, ConfigError, FeedSettings, WebSocketSettings};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
