//! Technical indicators
//!
//! Decimal implementations of the indicators used by the multi-factor
//! strategy. Every function looks at the trailing window of an ordered candle
//! slice and returns `None` when the window is too short or the data is
//! unusable; a zero divisor is reported the same way.
//!
//! Quotients are rounded half-up to [`PRICE_SCALE`] unless noted.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::types::{round_half_up, Candle, PRICE_SCALE};

const VOLUME_MULTIPLIER_SCALE: u32 = 4;

/// Upper / middle / lower Bollinger band values at the latest candle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BollingerBands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// Indicator values computed from a window ending at the latest candle.
///
/// `momentum` is `None` when the strategy runs without a momentum filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    pub close: Decimal,
    pub sma_short: Decimal,
    pub sma_long: Decimal,
    pub rsi: Decimal,
    pub atr: Decimal,
    pub bands: BollingerBands,
    pub volume_multiplier: Decimal,
    pub momentum: Option<Decimal>,
}

fn tail(candles: &[Candle], len: usize) -> &[Candle] {
    &candles[candles.len() - len..]
}

/// Simple moving average of the last `period` closes.
///
/// Candles with a missing close inside the window are left out of the mean.
pub fn sma(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let closes: Vec<Decimal> = tail(candles, period)
        .iter()
        .filter_map(|c| c.close)
        .collect();
    if closes.is_empty() {
        return None;
    }

    let sum: Decimal = closes.iter().sum();
    Some(round_half_up(
        sum / Decimal::from(closes.len()),
        PRICE_SCALE,
    ))
}

/// Close ratio `close[last] / close[last - period]`; above 1 means the price rose.
pub fn momentum(candles: &[Candle], period: usize) -> Option<Decimal> {
    if candles.len() <= period {
        return None;
    }

    let current = candles[candles.len() - 1].close?;
    let past = candles[candles.len() - period - 1].close?;
    if past.is_zero() {
        return None;
    }

    Some(round_half_up(current / past, PRICE_SCALE))
}

/// Relative Strength Index over the last `period` close-to-close transitions.
///
/// Gains and losses are plain sums, not smoothed averages. No losses at all
/// gives 100.
pub fn rsi(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() <= period {
        return None;
    }

    let mut gain = Decimal::ZERO;
    let mut loss = Decimal::ZERO;
    for pair in tail(candles, period + 1).windows(2) {
        let diff = pair[1].close? - pair[0].close?;
        if diff > Decimal::ZERO {
            gain += diff;
        } else {
            loss += diff.abs();
        }
    }

    let hundred = Decimal::ONE_HUNDRED;
    if loss.is_zero() {
        return Some(hundred);
    }

    let rs = round_half_up(gain / loss, PRICE_SCALE);
    Some(hundred - round_half_up(hundred / (Decimal::ONE + rs), PRICE_SCALE))
}

/// Average True Range: plain mean of the true range over the last `period` candles.
///
/// Each true range needs the previous close, so `period + 1` candles are required.
pub fn atr(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() <= period {
        return None;
    }

    let mut sum = Decimal::ZERO;
    for pair in tail(candles, period + 1).windows(2) {
        let prev_close = pair[0].close?;
        let cur = &pair[1];
        let high_low = (cur.high - cur.low).abs();
        let high_close = (cur.high - prev_close).abs();
        let low_close = (cur.low - prev_close).abs();
        sum += high_low.max(high_close).max(low_close);
    }

    Some(round_half_up(sum / Decimal::from(period), PRICE_SCALE))
}

/// Bollinger bands: SMA ± `num_std` population standard deviations.
///
/// The square root goes through `f64`; the result is brought back to
/// [`PRICE_SCALE`] before the bands are built. Unavailable when the variance
/// does not fit in a `Decimal`.
pub fn bollinger_bands(
    candles: &[Candle],
    period: usize,
    num_std: Decimal,
) -> Option<BollingerBands> {
    let middle = sma(candles, period)?;

    // squared deviations of very large prices can exceed the Decimal range
    let mut sum_sq = Decimal::ZERO;
    for candle in tail(candles, period) {
        let diff = candle.close? - middle;
        sum_sq = sum_sq.checked_add(diff.checked_mul(diff)?)?;
    }
    let variance = round_half_up(sum_sq / Decimal::from(period), PRICE_SCALE);

    let std_dev = Decimal::from_f64(variance.to_f64()?.sqrt())?;
    let width = num_std * round_half_up(std_dev, PRICE_SCALE);

    Some(BollingerBands {
        upper: middle + width,
        middle,
        lower: middle - width,
    })
}

/// Bollinger bands at the conventional two standard deviations
pub fn bollinger(candles: &[Candle], period: usize) -> Option<BollingerBands> {
    bollinger_bands(candles, period, Decimal::TWO)
}

/// Latest volume relative to the mean volume of the last `period` candles (scale 4)
pub fn volume_multiplier(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let sum: Decimal = tail(candles, period).iter().map(|c| c.volume).sum();
    let avg = round_half_up(sum / Decimal::from(period), PRICE_SCALE);
    if avg.is_zero() {
        return None;
    }

    let latest = candles[candles.len() - 1].volume;
    Some(round_half_up(latest / avg, VOLUME_MULTIPLIER_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn candles_from_closes(closes: &[Decimal]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let market = Symbol::new("KRW-BTC");
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Candle::new_unchecked(
                    market.clone(),
                    start + Duration::minutes(i as i64),
                    close,
                    close + dec!(1),
                    close - dec!(1),
                    Some(close),
                    dec!(100),
                )
            })
            .collect()
    }

    #[test]
    fn test_sma() {
        let candles = candles_from_closes(&[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);

        assert_eq!(sma(&candles[..2], 3), None);
        assert_eq!(sma(&candles[..3], 3), Some(dec!(2)));
        assert_eq!(sma(&candles, 3), Some(dec!(4)));
        assert_eq!(sma(&candles, 0), None);
    }

    #[test]
    fn test_sma_rounds_to_eight_places() {
        let candles = candles_from_closes(&[dec!(1), dec!(1), dec!(2)]);
        assert_eq!(sma(&candles, 3), Some(dec!(1.33333333)));
    }

    #[test]
    fn test_sma_skips_missing_closes() {
        let mut candles = candles_from_closes(&[dec!(10), dec!(20), dec!(30)]);
        candles[1].close = None;
        assert_eq!(sma(&candles, 3), Some(dec!(20)));
    }

    #[test]
    fn test_momentum() {
        let candles = candles_from_closes(&[dec!(100), dec!(101), dec!(102), dec!(110)]);

        assert_eq!(momentum(&candles, 3), Some(dec!(1.1)));
        assert_eq!(momentum(&candles[..3], 3), None);
    }

    #[test]
    fn test_momentum_missing_past_close() {
        let mut candles = candles_from_closes(&[dec!(100), dec!(101), dec!(102)]);
        candles[0].close = None;
        assert_eq!(momentum(&candles, 2), None);
    }

    #[test]
    fn test_rsi_all_gains_is_hundred() {
        let closes: Vec<Decimal> = (0..20).map(|i| Decimal::from(100 + i)).collect();
        let candles = candles_from_closes(&closes);
        assert_eq!(rsi(&candles, 14), Some(dec!(100)));
    }

    #[test]
    fn test_rsi_mixed() {
        // deltas: +2, -1, +2, -1 → gain 4, loss 2, rs 2, rsi 100 - 100/3
        let candles = candles_from_closes(&[dec!(10), dec!(12), dec!(11), dec!(13), dec!(12)]);
        assert_eq!(rsi(&candles, 4), Some(dec!(66.66666667)));
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        let candles = candles_from_closes(&[dec!(10), dec!(11), dec!(12)]);
        assert_eq!(rsi(&candles, 3), None);
        assert!(rsi(&candles, 2).is_some());
    }

    #[test]
    fn test_atr_uses_previous_close() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let market = Symbol::new("KRW-BTC");
        let candles = vec![
            Candle::new_unchecked(
                market.clone(),
                start,
                dec!(100),
                dec!(101),
                dec!(99),
                Some(dec!(100)),
                dec!(1),
            ),
            // gap up: high-low = 2, |high - prev close| = 10
            Candle::new_unchecked(
                market.clone(),
                start + Duration::minutes(1),
                dec!(108),
                dec!(110),
                dec!(108),
                Some(dec!(109)),
                dec!(1),
            ),
            // inside bar: high-low = 4 dominates
            Candle::new_unchecked(
                market,
                start + Duration::minutes(2),
                dec!(109),
                dec!(111),
                dec!(107),
                Some(dec!(110)),
                dec!(1),
            ),
        ];

        assert_eq!(atr(&candles, 2), Some(dec!(7)));
        assert_eq!(atr(&candles[..2], 2), None);
    }

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let candles = candles_from_closes(&[dec!(100), dec!(100), dec!(100)]);
        let bands = bollinger(&candles, 3).unwrap();
        assert_eq!(bands.upper, dec!(100));
        assert_eq!(bands.middle, dec!(100));
        assert_eq!(bands.lower, dec!(100));
    }

    #[test]
    fn test_bollinger_known_values() {
        // mean 5, population variance 4, std 2
        let closes = [
            dec!(2),
            dec!(4),
            dec!(4),
            dec!(4),
            dec!(5),
            dec!(5),
            dec!(7),
            dec!(9),
        ];
        let candles = candles_from_closes(&closes);
        let bands = bollinger(&candles, 8).unwrap();
        assert_eq!(bands.middle, dec!(5));
        assert_eq!(bands.upper, dec!(9));
        assert_eq!(bands.lower, dec!(1));
    }

    #[test]
    fn test_bollinger_ordering() {
        let candles = candles_from_closes(&[dec!(100), dec!(103), dec!(99), dec!(101)]);
        let bands = bollinger(&candles, 4).unwrap();
        assert!(bands.upper > bands.middle);
        assert!(bands.middle > bands.lower);
        approx::assert_relative_eq!(
            (bands.upper - bands.middle).to_f64().unwrap(),
            (bands.middle - bands.lower).to_f64().unwrap(),
            epsilon = 1e-8
        );
    }

    #[test]
    fn test_bollinger_unavailable_when_variance_overflows() {
        let closes: Vec<Decimal> = (0..20)
            .map(|i| if i % 2 == 0 { dec!(1000000000000000) } else { dec!(2000000000000000) })
            .collect();
        let candles = candles_from_closes(&closes);

        assert_eq!(sma(&candles, 20), Some(dec!(1500000000000000)));
        assert!(bollinger(&candles, 20).is_none());
    }

    #[test]
    fn test_volume_multiplier() {
        let mut candles = candles_from_closes(&[dec!(1), dec!(1), dec!(1), dec!(1)]);
        assert_eq!(volume_multiplier(&candles, 4), Some(dec!(1)));

        // volumes 100, 100, 100, 300 → avg 150 → 2.0
        candles[3].volume = dec!(300);
        assert_eq!(volume_multiplier(&candles, 4), Some(dec!(2)));
    }

    #[test]
    fn test_volume_multiplier_zero_average() {
        let mut candles = candles_from_closes(&[dec!(1), dec!(1)]);
        for candle in &mut candles {
            candle.volume = Decimal::ZERO;
        }
        assert_eq!(volume_multiplier(&candles, 2), None);
    }
}
