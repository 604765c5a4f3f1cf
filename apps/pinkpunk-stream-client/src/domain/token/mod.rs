//! Normalized Token Records
//!
//! The canonical record shape handed to the consumer. One record per token
//! pair, rebuilt from scratch on every inbound batch - nothing here is
//! mutated in place or kept across batches.

use serde::{Deserialize, Serialize};

/// Placeholder until elapsed time is derived from the feed's `timeDiff`.
// TODO: compute age from RawTokenRecord::time_diff once its format is confirmed.
pub const AGE_PLACEHOLDER: &str = "< 1d";

/// A trending token as presented to the consumer.
///
/// `rank` is the position in the batch the record arrived in (1-based) and
/// is reassigned on every batch - it is not a stable identifier. Percentage
/// fields are always in percent units (`1.08` = 1.08%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingToken {
    /// Position in the received batch, 1-based.
    pub rank: u32,
    /// Token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Chain/exchange label shown to the consumer.
    pub chain: String,
    /// Price in USD.
    pub price: f64,
    /// 1-hour price change, percent units.
    pub price_change_1h: f64,
    /// 24-hour price change, percent units.
    pub price_change_24h: f64,
    /// 24-hour volume in USD.
    pub volume_24h: f64,
    /// 24-hour volume change, percent units. The feed does not provide
    /// this; always zero.
    pub volume_change_24h: f64,
    /// Market capitalization in USD.
    pub market_cap: f64,
    /// 24-hour market cap change, percent units. Not provided by the feed.
    pub market_cap_change_24h: f64,
    /// Holder count. Not provided by the feed.
    pub holders: u64,
    /// 24-hour holder change, percent units. Not provided by the feed.
    pub holders_change_24h: f64,
    /// 24-hour transaction count.
    pub txns_24h: u64,
    /// 24-hour transaction change, percent units. Not provided by the feed.
    pub txns_change_24h: f64,
    /// Elapsed-time label.
    pub age: String,
    /// Millisecond timestamp of when this record was normalized.
    pub last_update: i64,
    /// DEX the pair trades on.
    pub dex: String,
    /// Pool liquidity in USD.
    pub liquidity: f64,
    /// Pair address.
    pub pair: String,
}

/// Reconcile a change field into percent units.
///
/// The feed emits change fields in two conventions: fractions (`0.0108`
/// for 1.08%) and ready percentages (`13.5`). A non-zero value with
/// magnitude below 1 is read as a fraction and scaled by 100; everything
/// else passes through, `NaN` included. A genuine sub-1% value arriving
/// already in percent units is indistinguishable from a fraction and will
/// be over-scaled; the upstream convention is not pinned down.
#[must_use]
pub fn normalize_percentage(value: f64) -> f64 {
    if value != 0.0 && value.abs() < 1.0 {
        value * 100.0
    } else {
        value
    }
}
