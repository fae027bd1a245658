//! Multi-factor signal logic
//!
//! Buy: short SMA above long SMA, RSI low, volume expanding, price at or
//! under the lower Bollinger band and positive momentum.
//! Sell: short SMA below long SMA, RSI overbought, or price at the upper band
//! with RSI confirming.

use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use super::MultiFactorConfig;
use crate::indicators::{self, IndicatorSnapshot};
use crate::strategies::{Strategy, TradingContext};
use crate::{Candle, OrderIntent, Symbol};

pub struct MultiFactorStrategy {
    config: MultiFactorConfig,
}

impl MultiFactorStrategy {
    pub fn new(config: MultiFactorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MultiFactorConfig {
        &self.config
    }

    /// Compute every indicator the rule needs, or `None` if any is unavailable
    pub fn snapshot(&self, candles: &[Candle]) -> Option<IndicatorSnapshot> {
        let cfg = &self.config;
        let close = candles.last()?.close?;

        let momentum = match cfg.momentum_min {
            Some(_) => Some(indicators::momentum(candles, cfg.momentum_period)?),
            None => None,
        };

        Some(IndicatorSnapshot {
            close,
            sma_short: indicators::sma(candles, cfg.ma_short)?,
            sma_long: indicators::sma(candles, cfg.ma_long)?,
            rsi: indicators::rsi(candles, cfg.rsi_period)?,
            atr: indicators::atr(candles, cfg.atr_period)?,
            bands: indicators::bollinger_bands(candles, cfg.bb_period, cfg.bb_std_devs)?,
            volume_multiplier: indicators::volume_multiplier(candles, cfg.volume_period)?,
            momentum,
        })
    }

    pub fn is_buy(&self, s: &IndicatorSnapshot) -> bool {
        let cfg = &self.config;

        let bull_cross = s.sma_short > s.sma_long;
        let rsi_ok = s.rsi <= cfg.rsi_buy_max;
        let volume_ok = s.volume_multiplier >= cfg.volume_multiplier_min;
        let near_lower_band = !cfg.lower_band_filter || s.close <= s.bands.lower;
        let momentum_up = match (cfg.momentum_min, s.momentum) {
            (Some(min), Some(momentum)) => momentum > min,
            (Some(_), None) => false,
            (None, _) => true,
        };

        bull_cross && rsi_ok && volume_ok && near_lower_band && momentum_up
    }

    pub fn is_sell(&self, s: &IndicatorSnapshot) -> bool {
        let cfg = &self.config;

        let bear_cross = s.sma_short < s.sma_long;
        let rsi_high = s.rsi > cfg.rsi_sell_min;
        let upper_band_exit = s.close >= s.bands.upper && s.rsi > cfg.rsi_confirm_min;

        bear_cross || rsi_high || upper_band_exit
    }

    fn log_diagnostics(&self, market: &Symbol, s: &IndicatorSnapshot) {
        debug!(
            %market,
            close = %s.close,
            sma_short = %s.sma_short,
            sma_long = %s.sma_long,
            trend = if s.sma_short > s.sma_long { "golden" } else { "dead" },
            rsi = %s.rsi,
            atr = %s.atr,
            volume_x = %s.volume_multiplier,
            momentum = ?s.momentum,
            bb_lower = %s.bands.lower,
            bb_upper = %s.bands.upper,
            "Condition diagnostics"
        );
    }

    fn build_buy(&self, market: &Symbol, ctx: &TradingContext<'_>) -> Option<OrderIntent> {
        let notional = match ctx.sizer.buy_notional(ctx.account) {
            Ok(n) => n,
            Err(e) => {
                error!(%market, error = %e, "Buy order construction failed: sizing");
                return None;
            }
        };
        if notional <= Decimal::ZERO {
            debug!(%market, %notional, "Buy skipped: no notional to spend");
            return None;
        }

        let limits = match ctx.limits.limits(market) {
            Ok(l) => l,
            Err(e) => {
                error!(%market, error = %e, "Buy order construction failed: limits");
                return None;
            }
        };
        if limits.max_buy_notional <= Decimal::ZERO {
            warn!(%market, limit = %limits.max_buy_notional, "Invalid max buy notional");
            return None;
        }

        Some(OrderIntent::market_buy(
            market.clone(),
            notional.min(limits.max_buy_notional),
        ))
    }

    fn build_sell(&self, market: &Symbol, ctx: &TradingContext<'_>) -> Option<OrderIntent> {
        let held = match ctx.account.coin_balance(market) {
            Ok(q) => q,
            Err(e) => {
                error!(%market, error = %e, "Sell order construction failed: balance");
                return None;
            }
        };
        if held <= Decimal::ZERO {
            return None;
        }

        let limits = match ctx.limits.limits(market) {
            Ok(l) => l,
            Err(e) => {
                error!(%market, error = %e, "Sell order construction failed: limits");
                return None;
            }
        };
        if limits.max_sell_quantity <= Decimal::ZERO {
            warn!(%market, limit = %limits.max_sell_quantity, "Invalid max sell quantity");
            return None;
        }

        Some(OrderIntent::market_sell(
            market.clone(),
            held.min(limits.max_sell_quantity),
        ))
    }
}

impl Strategy for MultiFactorStrategy {
    fn name(&self) -> &'static str {
        "multi_factor"
    }

    fn min_candles(&self) -> usize {
        self.config.max_period()
    }

    fn produce_signal(&self, candles: &[Candle], ctx: &TradingContext<'_>) -> Option<OrderIntent> {
        let required = self.min_candles();
        if candles.len() < required {
            warn!(required, available = candles.len(), "Insufficient candles");
            return None;
        }

        let latest = candles.last()?;
        if latest.close.is_none() {
            warn!(market = %latest.market, timestamp = %latest.timestamp, "Latest candle has no close");
            return None;
        }

        let Some(snapshot) = self.snapshot(candles) else {
            warn!(market = %latest.market, "Indicator unavailable");
            return None;
        };
        self.log_diagnostics(&latest.market, &snapshot);

        if self.is_buy(&snapshot) {
            self.build_buy(&latest.market, ctx)
        } else if self.is_sell(&snapshot) {
            self.build_sell(&latest.market, ctx)
        } else {
            None
        }
    }
}
