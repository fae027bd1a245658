//! Sub-minute to 1-minute candle aggregation
//!
//! Feeds that deliver second-resolution bars are resampled into one candle
//! per minute before they reach the simulator.

use chrono::{DateTime, DurationRound, TimeDelta, Timelike, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::Candle;

/// True when the first candle's timestamp has non-zero seconds
pub fn needs_aggregation(candles: &[Candle]) -> bool {
    candles.first().is_some_and(|c| c.timestamp.second() != 0)
}

fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Group candles by minute: first open, last close, max high, min low, summed volume.
///
/// Output is ordered by minute. Within a minute, input order decides which
/// candle is "first" and "last".
pub fn to_minute_candles(candles: &[Candle]) -> Vec<Candle> {
    let mut buckets: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();

    for candle in candles {
        let minute = floor_to_minute(candle.timestamp);
        buckets
            .entry(minute)
            .and_modify(|bar| {
                bar.high = bar.high.max(candle.high);
                bar.low = bar.low.min(candle.low);
                bar.close = candle.close;
                bar.volume += candle.volume;
            })
            .or_insert_with(|| Candle {
                timestamp: minute,
                ..candle.clone()
            });
    }

    buckets.into_values().collect()
}

/// Aggregate when the series is sub-minute, otherwise return it unchanged
pub fn aggregate_if_needed(candles: Vec<Candle>) -> Vec<Candle> {
    if needs_aggregation(&candles) {
        let minute_bars = to_minute_candles(&candles);
        tracing::info!(
            input = candles.len(),
            output = minute_bars.len(),
            "Aggregated sub-minute candles"
        );
        minute_bars
    } else {
        candles
    }
}

/// Total traded volume across a series
pub fn total_volume(candles: &[Candle]) -> Decimal {
    candles.iter().map(|c| c.volume).sum()
}
