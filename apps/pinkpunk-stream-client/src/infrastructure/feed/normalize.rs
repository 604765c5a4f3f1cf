//! Token Normalization
//!
//! Maps wire-level token records into the consumer-facing
//! [`TrendingToken`] shape. Rank is assigned by position in the batch and
//! recomputed on every batch. Change fields go through the percentage
//! unit heuristic; fields the feed does not provide default to zero.
//!
//! Normalization never fails: malformed numerics surface as `NaN` in the
//! output rather than as an error to the caller.

use chrono::Utc;

use super::messages::RawTokenRecord;
use crate::domain::token::{AGE_PLACEHOLDER, TrendingToken, normalize_percentage};

/// Normalize one inbound batch, assigning 1-based ranks by position.
#[must_use]
pub fn normalize_batch(records: Vec<RawTokenRecord>) -> Vec<TrendingToken> {
    let stamped_at = Utc::now().timestamp_millis();
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| normalize_record(index as u32 + 1, record, stamped_at))
        .collect()
}

fn normalize_record(rank: u32, raw: RawTokenRecord, stamped_at: i64) -> TrendingToken {
    TrendingToken {
        rank,
        name: raw.base_name,
        symbol: raw.base_symbol,
        chain: raw.dex.clone(),
        price: raw.price_usd,
        price_change_1h: normalize_percentage(raw.price_change_1h),
        price_change_24h: normalize_percentage(raw.price_change_24h),
        volume_24h: raw.volume_usd_24h,
        volume_change_24h: 0.0,
        market_cap: raw.market_cap,
        market_cap_change_24h: 0.0,
        holders: 0,
        holders_change_24h: 0.0,
        txns_24h: raw.count_24h,
        txns_change_24h: 0.0,
        age: AGE_PLACEHOLDER.to_string(),
        last_update: stamped_at,
        dex: raw.dex,
        liquidity: raw.liquidity,
        pair: raw.pair,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acm_record() -> RawTokenRecord {
        RawTokenRecord {
            base_name: "Acme".to_string(),
            base_symbol: "ACM".to_string(),
            dex: "pancake".to_string(),
            pair: "0xpair".to_string(),
            price_usd: 0.122916,
            price_change_1h: 0.0108,
            price_change_24h: -0.0087,
            volume_usd_24h: 979.95,
            market_cap: 1_000_000.0,
            liquidity: 50_000.0,
            count_24h: 42,
            ..RawTokenRecord::default()
        }
    }

    #[test]
    fn maps_identifiers_and_passthrough_fields() {
        let tokens = normalize_batch(vec![acm_record()]);
        let token = &tokens[0];

        assert_eq!(token.rank, 1);
        assert_eq!(token.name, "Acme");
        assert_eq!(token.symbol, "ACM");
        assert_eq!(token.chain, "pancake");
        assert_eq!(token.dex, "pancake");
        assert_eq!(token.pair, "0xpair");
        assert!((token.price - 0.122916).abs() < 1e-12);
        assert!((token.volume_24h - 979.95).abs() < 1e-9);
        assert!((token.market_cap - 1_000_000.0).abs() < f64::EPSILON);
        assert!((token.liquidity - 50_000.0).abs() < f64::EPSILON);
        assert_eq!(token.txns_24h, 42);
    }

    #[test]
    fn scales_fractional_changes_to_percent() {
        let tokens = normalize_batch(vec![acm_record()]);
        let token = &tokens[0];

        assert!((token.price_change_1h - 1.08).abs() < 1e-9);
        assert!((token.price_change_24h - (-0.87)).abs() < 1e-9);
    }

    #[test]
    fn passes_percent_changes_through() {
        let record = RawTokenRecord {
            price_change_24h: 13.5,
            ..acm_record()
        };
        let tokens = normalize_batch(vec![record]);
        assert!((tokens[0].price_change_24h - 13.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ranks_follow_batch_order() {
        let batch = vec![
            RawTokenRecord {
                base_symbol: "AAA".to_string(),
                ..RawTokenRecord::default()
            },
            RawTokenRecord {
                base_symbol: "BBB".to_string(),
                ..RawTokenRecord::default()
            },
            RawTokenRecord {
                base_symbol: "CCC".to_string(),
                ..RawTokenRecord::default()
            },
        ];
        let tokens = normalize_batch(batch);
        let ranked: Vec<(u32, &str)> = tokens
            .iter()
            .map(|t| (t.rank, t.symbol.as_str()))
            .collect();
        assert_eq!(ranked, vec![(1, "AAA"), (2, "BBB"), (3, "CCC")]);
    }

    #[test]
    fn ranks_reset_per_batch() {
        let first = normalize_batch(vec![acm_record(), acm_record()]);
        assert_eq!(first.last().map(|t| t.rank), Some(2));

        let second = normalize_batch(vec![acm_record()]);
        assert_eq!(second[0].rank, 1);
    }

    #[test]
    fn unprovided_fields_default_to_zero() {
        let tokens = normalize_batch(vec![acm_record()]);
        let token = &tokens[0];

        assert!(token.volume_change_24h.abs() < f64::EPSILON);
        assert!(token.market_cap_change_24h.abs() < f64::EPSILON);
        assert_eq!(token.holders, 0);
        assert!(token.holders_change_24h.abs() < f64::EPSILON);
        assert!(token.txns_change_24h.abs() < f64::EPSILON);
        assert_eq!(token.age, AGE_PLACEHOLDER);
        assert!(token.last_update > 0);
    }

    #[test]
    fn malformed_numerics_become_nan_not_errors() {
        let record = RawTokenRecord {
            price_usd: f64::NAN,
            price_change_1h: f64::NAN,
            ..acm_record()
        };
        let tokens = normalize_batch(vec![record]);
        assert!(tokens[0].price.is_nan());
        assert!(tokens[0].price_change_1h.is_nan());
    }

    #[test]
    fn empty_batch_yields_empty_output() {
        assert!(normalize_batch(vec![]).is_empty());
    }
}
