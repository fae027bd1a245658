//! Property tests over arbitrary candle series

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coin_signal_engine::aggregate;
use coin_signal_engine::backtest::run_backtest;
use coin_signal_engine::indicators;
use coin_signal_engine::strategies::multi_factor::{MultiFactorConfig, MultiFactorStrategy};
use coin_signal_engine::{Candle, Symbol};

/// Close in cents (1.00 .. 5000.00) and volume in whole units
fn bar_strategy() -> impl Strategy<Value = (i64, i64)> {
    (100i64..500_000, 0i64..10_000)
}

fn build_candles(bars: &[(i64, i64)], step_seconds: i64) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let market = Symbol::new("KRW-BTC");
    bars.iter()
        .enumerate()
        .map(|(i, &(cents, volume))| {
            let close = Decimal::new(cents, 2);
            Candle::new_unchecked(
                market.clone(),
                start + Duration::seconds(step_seconds * i as i64),
                close,
                close * dec!(1.01),
                close * dec!(0.99),
                Some(close),
                Decimal::from(volume),
            )
        })
        .collect()
}

fn trading_strategy() -> MultiFactorStrategy {
    MultiFactorStrategy::new(MultiFactorConfig {
        ma_short: 3,
        ma_long: 8,
        rsi_period: 5,
        atr_period: 5,
        bb_period: 6,
        volume_period: 5,
        momentum_period: 3,
        rsi_buy_max: dec!(70),
        volume_multiplier_min: dec!(0.5),
        momentum_min: None,
        lower_band_filter: false,
        ..MultiFactorConfig::default()
    })
}

proptest! {
    #[test]
    fn rsi_stays_in_range(
        bars in prop::collection::vec(bar_strategy(), 2..80),
        period in 1usize..30,
    ) {
        let candles = build_candles(&bars, 60);
        if let Some(rsi) = indicators::rsi(&candles, period) {
            prop_assert!(rsi >= Decimal::ZERO);
            prop_assert!(rsi <= Decimal::ONE_HUNDRED);
        }
    }

    #[test]
    fn bollinger_bands_are_ordered(
        bars in prop::collection::vec(bar_strategy(), 1..80),
        period in 1usize..30,
    ) {
        let candles = build_candles(&bars, 60);
        if let Some(bands) = indicators::bollinger(&candles, period) {
            prop_assert!(bands.upper >= bands.middle);
            prop_assert!(bands.middle >= bands.lower);
        }
    }

    #[test]
    fn backtest_drawdown_is_monotone_and_balances_non_negative(
        bars in prop::collection::vec(bar_strategy(), 0..120),
        warmup in 0usize..20,
    ) {
        let candles = build_candles(&bars, 60);
        let strategy = trading_strategy();
        let result = run_backtest(&strategy, &candles, dec!(10000000), dec!(0.0005), warmup)
            .unwrap();

        prop_assert_eq!(result.equity_curve.len(), candles.len().saturating_sub(warmup));
        for pair in result.equity_curve.windows(2) {
            prop_assert!(pair[1].max_drawdown >= pair[0].max_drawdown);
        }
        for point in &result.equity_curve {
            prop_assert!(point.cash >= Decimal::ZERO);
            prop_assert!(point.coin >= Decimal::ZERO);
            prop_assert!(point.max_drawdown >= Decimal::ZERO);
            prop_assert!(point.max_drawdown <= Decimal::ONE);
        }
    }

    #[test]
    fn aggregation_is_idempotent(
        bars in prop::collection::vec(bar_strategy(), 1..60),
        step_seconds in prop::sample::select(vec![5i64, 10, 15, 20, 30]),
    ) {
        let mut candles = build_candles(&bars, step_seconds);
        // shift off the minute boundary so the series counts as sub-minute
        for candle in &mut candles {
            candle.timestamp += Duration::seconds(1);
        }

        let once = aggregate::aggregate_if_needed(candles.clone());
        let twice = aggregate::aggregate_if_needed(once.clone());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(
            aggregate::total_volume(&once),
            aggregate::total_volume(&candles)
        );
        for pair in once.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
