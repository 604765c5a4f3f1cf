//! Feed Wire Message Types
//!
//! Wire format types for the trending feed's WebSocket protocol, plus the
//! outbound control payload builders and inbound classification.
//!
//! # Control Payloads (outbound)
//!
//! ```json
//! {"topic":"trending","event":"sub","interval":"","pair":"","chainId":"56","compression":0}
//! {"topic":"ping","event":"sub","interval":"","pair":"","chainId":"56","compression":0}
//! {"topic":"pong","event":"sub","pong":"<echo>","interval":"","pair":"","chainId":"","compression":1}
//! ```
//!
//! # Inbound Envelope
//!
//! Every inbound frame decodes to one [`FeedEnvelope`]; all fields are
//! optional on the wire. Data batches arrive under `data`, liveness
//! messages under `topic`/`pong`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Subscription topic for the trending token stream.
pub const TOPIC_TRENDING: &str = "trending";
/// Liveness topics.
pub const TOPIC_PING: &str = "ping";
/// Reply topic for liveness messages.
pub const TOPIC_PONG: &str = "pong";
/// The only control event the feed understands.
pub const EVENT_SUB: &str = "sub";

// =============================================================================
// Inbound Types
// =============================================================================

/// Superset envelope for every inbound feed message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedEnvelope {
    /// Server status text, if any.
    pub msg: Option<String>,
    /// Server status code, if any.
    pub code: Option<String>,
    /// Server timestamp, milliseconds.
    pub t: Option<i64>,
    /// Token batch for data messages.
    pub data: Option<Vec<RawTokenRecord>>,
    /// Message topic.
    pub topic: Option<String>,
    /// Compression flag echoed by the server.
    pub compression: Option<u8>,
    /// Control event name.
    pub event: Option<String>,
    /// Candle interval, unused by the trending stream.
    pub interval: Option<String>,
    /// Pair filter, unused by the trending stream.
    pub pair: Option<String>,
    /// Chain identifier.
    pub chain_id: Option<String>,
    /// Liveness echo token.
    pub pong: Option<String>,
}

/// One token pair as it appears on the wire.
///
/// Every field is defaulted so a partial record still decodes; the record
/// is immutable once decoded and consumed exactly once by normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTokenRecord {
    /// Base token decimal places.
    pub base_decimals: u32,
    /// Base token name.
    pub base_name: String,
    /// Base token total supply.
    pub base_supply: f64,
    /// Base token ticker symbol.
    pub base_symbol: String,
    /// Base token contract address.
    pub base_token: String,
    /// Buy transactions in the last 24 hours.
    pub buy_count_24h: u64,
    /// Chain identifier.
    pub chain_id: String,
    /// Total transactions in the last 24 hours.
    pub count_24h: u64,
    /// DEX the pair trades on.
    pub dex: String,
    /// Social/info links.
    pub info: TokenLinks,
    /// Pool liquidity in USD.
    pub liquidity: f64,
    /// Market capitalization in USD.
    pub market_cap: f64,
    /// Pair address.
    pub pair: String,
    /// Pair price.
    pub price: f64,
    /// 1-hour price change as emitted by the feed.
    pub price_change_1h: f64,
    /// 1-minute price change as emitted by the feed.
    pub price_change_1m: f64,
    /// 24-hour price change as emitted by the feed.
    pub price_change_24h: f64,
    /// 5-minute price change as emitted by the feed.
    pub price_change_5m: f64,
    /// Price in the chain's native currency.
    pub price_native: f64,
    /// Price in USD.
    pub price_usd: f64,
    /// Quote token name.
    pub quote_name: String,
    /// Quote token ticker symbol.
    pub quote_symbol: String,
    /// Quote token contract address.
    pub quote_token: String,
    /// Sell transactions in the last 24 hours.
    pub sell_count_24h: u64,
    /// Elapsed-time label emitted by the feed.
    pub time_diff: String,
    /// 24-hour volume in USD.
    pub volume_usd_24h: f64,
}

/// Social and info links attached to a token record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLinks {
    /// Twitter/X profile URL.
    pub twitter: String,
    /// Project website URL.
    pub website: String,
    /// Telegram group URL.
    pub telegram: String,
}

// =============================================================================
// Outbound Control Payloads
// =============================================================================

/// Outbound control message: subscribe, ping, or pong.
///
/// The feed keys on `topic`; the remaining fields are carried on every
/// control message with fixed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPayload {
    /// Control topic.
    pub topic: String,
    /// Control event, always `"sub"`.
    pub event: String,
    /// Liveness echo token, pong only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong: Option<String>,
    /// Candle interval, always empty.
    pub interval: String,
    /// Pair filter, always empty.
    pub pair: String,
    /// Chain identifier.
    pub chain_id: String,
    /// Whether the server may compress frames on this topic.
    pub compression: u8,
}

impl ControlPayload {
    /// Subscribe to the trending stream. Sent exactly once per open.
    #[must_use]
    pub fn subscribe(chain_id: &str) -> Self {
        Self {
            topic: TOPIC_TRENDING.to_string(),
            event: EVENT_SUB.to_string(),
            pong: None,
            interval: String::new(),
            pair: String::new(),
            chain_id: chain_id.to_string(),
            compression: 0,
        }
    }

    /// Liveness probe sent by the heartbeat monitor.
    #[must_use]
    pub fn ping(chain_id: &str) -> Self {
        Self {
            topic: TOPIC_PING.to_string(),
            event: EVENT_SUB.to_string(),
            pong: None,
            interval: String::new(),
            pair: String::new(),
            chain_id: chain_id.to_string(),
            compression: 0,
        }
    }

    /// Reply to an inbound ping, echoing the peer's token when present.
    #[must_use]
    pub fn pong(echo: Option<String>) -> Self {
        Self {
            topic: TOPIC_PONG.to_string(),
            event: EVENT_SUB.to_string(),
            pong: Some(echo.unwrap_or_else(timestamp_token)),
            interval: String::new(),
            pair: String::new(),
            chain_id: String::new(),
            compression: 1,
        }
    }

    /// Serialize to the wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Millisecond-timestamp token used when the peer's ping carries no echo.
fn timestamp_token() -> String {
    Utc::now().timestamp_millis().to_string()
}

// =============================================================================
// Inbound Classification
// =============================================================================

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Liveness probe from the peer; answered with a pong, never forwarded.
    Ping {
        /// Token to echo back in the pong reply.
        echo: Option<String>,
    },
    /// Liveness reply without an echo token; proof-of-life only.
    Pong,
    /// A non-empty token batch for the consumer.
    Data(Vec<RawTokenRecord>),
    /// Acknowledgement of the trending subscription.
    Subscribed,
    /// Anything else; logged and dropped.
    Unknown,
}

impl FeedMessage {
    /// Classify a decoded envelope.
    ///
    /// A message is a ping when its topic is `"ping"` or it carries a pong
    /// token - the feed attaches the echo token to the ping itself.
    #[must_use]
    pub fn classify(envelope: FeedEnvelope) -> Self {
        if envelope.topic.as_deref() == Some(TOPIC_PING) || envelope.pong.is_some() {
            return Self::Ping { echo: envelope.pong };
        }
        if envelope.topic.as_deref() == Some(TOPIC_PONG) {
            return Self::Pong;
        }
        match envelope.data {
            Some(records) if !records.is_empty() => Self::Data(records),
            _ if envelope.topic.as_deref() == Some(TOPIC_TRENDING) => Self::Subscribed,
            _ => Self::Unknown,
        }
    }
}
