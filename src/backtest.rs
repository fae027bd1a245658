//! Backtesting engine
//!
//! Replays a candle series bar by bar through a strategy, applying each
//! order to a simulated cash/coin portfolio with a proportional fee. All
//! arithmetic is exact decimal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{BacktestError, CollaboratorError, CollaboratorResult};
use crate::exchange::{AccountSource, ExchangeLimits};
use crate::risk::{sizer_from_config, FixedNotionalSizer, PositionSizer};
use crate::strategies::{Strategy, TradingContext};
use crate::types::{round_half_up, truncate, PRICE_SCALE};
use crate::{Candle, OrderIntent, Side, Symbol};

/// Fractional digits kept when converting a buy notional into coins
const QUANTITY_SCALE: u32 = 8;

/// Run parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktestParams {
    pub initial_cash: Decimal,
    /// Fraction of notional charged per trade
    pub fee_rate: Decimal,
    pub warmup_bars: usize,
    pub limits: ExchangeLimits,
}

impl BacktestParams {
    pub fn new(initial_cash: Decimal, fee_rate: Decimal, warmup_bars: usize) -> Self {
        Self {
            initial_cash,
            fee_rate,
            warmup_bars,
            limits: ExchangeLimits::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_cash: config.backtest.initial_cash,
            fee_rate: config.exchange.fee_rate,
            warmup_bars: config.backtest.warmup_bars,
            limits: config.exchange.limits(),
        }
    }

    pub fn with_limits(mut self, limits: ExchangeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.initial_cash <= Decimal::ZERO {
            return Err(BacktestError::NonPositiveInitialCash(self.initial_cash));
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(BacktestError::InvalidFeeRate(self.fee_rate));
        }
        Ok(())
    }
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A trade the simulator actually applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fill {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    /// Coins bought (before fee) or sold
    pub quantity: Decimal,
    /// Cash spent on a buy, gross proceeds of a sell
    pub notional: Decimal,
    /// Fee in quote currency
    pub fee: Decimal,
}

/// Portfolio state after an evaluated bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub coin: Decimal,
    pub equity: Decimal,
    /// Running maximum drawdown, as a fraction
    pub max_drawdown: Decimal,
}

/// Simulated portfolio, owned by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioState {
    cash: Decimal,
    coin: Decimal,
    equity: Decimal,
    peak_equity: Decimal,
    max_drawdown: Decimal,
}

impl PortfolioState {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            coin: Decimal::ZERO,
            equity: initial_cash,
            peak_equity: initial_cash,
            max_drawdown: Decimal::ZERO,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn coin(&self) -> Decimal {
        self.coin
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    pub fn peak_equity(&self) -> Decimal {
        self.peak_equity
    }

    /// Largest peak-to-trough decline seen so far, as a fraction
    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }

    /// Spend `notional` cash at `price`. Returns `None` (and changes nothing)
    /// when the cash is not there or the notional buys no coin at all.
    pub fn apply_buy(
        &mut self,
        timestamp: DateTime<Utc>,
        notional: Decimal,
        price: Decimal,
        fee_rate: Decimal,
    ) -> Option<Fill> {
        if notional <= Decimal::ZERO || price <= Decimal::ZERO || self.cash < notional {
            return None;
        }

        let quantity = truncate(notional / price, QUANTITY_SCALE);
        if quantity.is_zero() {
            return None;
        }

        let fee_coin = quantity * fee_rate;
        self.cash -= notional;
        self.coin += quantity - fee_coin;

        Some(Fill {
            timestamp,
            side: Side::Buy,
            price,
            quantity,
            notional,
            fee: fee_coin * price,
        })
    }

    /// Sell `quantity` coins at `price`. Returns `None` when not enough coin is
    /// held or the proceeds do not fit in a `Decimal`.
    pub fn apply_sell(
        &mut self,
        timestamp: DateTime<Utc>,
        quantity: Decimal,
        price: Decimal,
        fee_rate: Decimal,
    ) -> Option<Fill> {
        if quantity <= Decimal::ZERO || self.coin < quantity {
            return None;
        }

        let gross = quantity.checked_mul(price)?;
        let fee = gross.checked_mul(fee_rate)?;
        let cash = self.cash.checked_add(gross - fee)?;
        self.coin -= quantity;
        self.cash = cash;

        Some(Fill {
            timestamp,
            side: Side::Sell,
            price,
            quantity,
            notional: gross,
            fee,
        })
    }

    /// Revalue at `price` and update the peak and drawdown.
    ///
    /// A valuation outside the `Decimal` range leaves the state untouched.
    pub fn mark(&mut self, price: Decimal) {
        let Some(equity) = self.coin.checked_mul(price).and_then(|v| v.checked_add(self.cash))
        else {
            warn!(coin = %self.coin, %price, "Equity overflow, mark skipped");
            return;
        };
        self.equity = equity;
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }

        if self.peak_equity > Decimal::ZERO {
            let drawdown = round_half_up(
                (self.peak_equity - self.equity) / self.peak_equity,
                PRICE_SCALE,
            );
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }
}

/// The portfolio as seen by the strategy while a bar is evaluated
struct PortfolioView<'a> {
    state: &'a PortfolioState,
    price: Decimal,
}

impl AccountSource for PortfolioView<'_> {
    fn coin_balance(&self, _market: &Symbol) -> CollaboratorResult<Decimal> {
        Ok(self.state.coin)
    }

    fn total_asset_value(&self) -> CollaboratorResult<Decimal> {
        self.state
            .coin
            .checked_mul(self.price)
            .and_then(|v| v.checked_add(self.state.cash))
            .ok_or_else(|| CollaboratorError::Sizing("portfolio value overflow".to_string()))
    }
}

/// Outcome of one backtest run
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub initial_cash: Decimal,
    pub final_cash: Decimal,
    pub final_coin: Decimal,
    pub final_equity: Decimal,
    /// (final − initial) / initial × 100
    pub yield_pct: Decimal,
    /// Largest peak-to-trough equity decline × 100
    pub max_drawdown_pct: Decimal,
    pub bars_evaluated: usize,
    /// Intents that would have overdrawn cash or coin
    pub skipped_intents: usize,
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    fn from_state(
        params: &BacktestParams,
        state: &PortfolioState,
        bars_evaluated: usize,
        skipped_intents: usize,
        fills: Vec<Fill>,
        equity_curve: Vec<EquityPoint>,
    ) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        let yield_ratio = round_half_up(
            (state.equity - params.initial_cash) / params.initial_cash,
            PRICE_SCALE,
        );

        Self {
            initial_cash: params.initial_cash,
            final_cash: state.cash,
            final_coin: state.coin,
            final_equity: state.equity,
            yield_pct: yield_ratio * hundred,
            max_drawdown_pct: state.max_drawdown * hundred,
            bars_evaluated,
            skipped_intents,
            fills,
            equity_curve,
        }
    }

    pub fn total_trades(&self) -> usize {
        self.fills.len()
    }

    /// Yield rounded for display
    pub fn yield_pct_display(&self) -> Decimal {
        round_half_up(self.yield_pct, 2)
    }

    /// Max drawdown rounded for display
    pub fn max_drawdown_pct_display(&self) -> Decimal {
        round_half_up(self.max_drawdown_pct, 2)
    }
}

/// Backtest engine
pub struct Backtester {
    strategy: Box<dyn Strategy>,
    sizer: Box<dyn PositionSizer>,
    params: BacktestParams,
}

impl Backtester {
    /// Backtester with the fixed-notional sizer
    pub fn new(strategy: Box<dyn Strategy>, params: BacktestParams) -> Result<Self, BacktestError> {
        params.validate()?;
        Ok(Backtester {
            strategy,
            sizer: Box::new(FixedNotionalSizer::default()),
            params,
        })
    }

    /// Backtester with parameters, limits and sizing taken from the config
    pub fn from_config(config: &Config, strategy: Box<dyn Strategy>) -> Result<Self, BacktestError> {
        let backtester = Self::new(strategy, BacktestParams::from_config(config))?;
        Ok(backtester.with_sizer(sizer_from_config(&config.trading.sizing)))
    }

    pub fn with_sizer(mut self, sizer: Box<dyn PositionSizer>) -> Self {
        self.sizer = sizer;
        self
    }

    pub fn run(&self, candles: &[Candle]) -> BacktestResult {
        simulate(self.strategy.as_ref(), self.sizer.as_ref(), &self.params, candles)
    }
}

/// Run a backtest with the default sizing and exchange limits
pub fn run_backtest(
    strategy: &dyn Strategy,
    candles: &[Candle],
    initial_cash: Decimal,
    fee_rate: Decimal,
    warmup_bars: usize,
) -> Result<BacktestResult, BacktestError> {
    let params = BacktestParams::new(initial_cash, fee_rate, warmup_bars);
    params.validate()?;
    Ok(simulate(
        strategy,
        &FixedNotionalSizer::default(),
        &params,
        candles,
    ))
}

fn simulate(
    strategy: &dyn Strategy,
    sizer: &dyn PositionSizer,
    params: &BacktestParams,
    candles: &[Candle],
) -> BacktestResult {
    let mut state = PortfolioState::new(params.initial_cash);
    let mut fills = Vec::new();
    let mut equity_curve = Vec::with_capacity(candles.len().saturating_sub(params.warmup_bars));
    let mut skipped_intents = 0usize;
    let mut last_price: Option<Decimal> = None;

    for (i, candle) in candles.iter().enumerate() {
        if candle.close.is_some() {
            last_price = candle.close;
        }
        if i < params.warmup_bars {
            continue;
        }

        if let Some(price) = candle.close {
            let window = &candles[..=i];
            let intent = {
                let view = PortfolioView {
                    state: &state,
                    price,
                };
                let ctx = TradingContext::new(sizer, &view, &params.limits);
                strategy.produce_signal(window, &ctx)
            };

            if let Some(intent) = intent {
                match execute(&mut state, &intent, candle.timestamp, price, params.fee_rate) {
                    Some(fill) => {
                        info!(
                            timestamp = %candle.timestamp,
                            side = %fill.side,
                            %price,
                            quantity = %fill.quantity,
                            notional = %fill.notional,
                            "Fill"
                        );
                        fills.push(fill);
                    }
                    None => {
                        skipped_intents += 1;
                        debug!(timestamp = %candle.timestamp, %intent, "Intent skipped: insufficient balance");
                    }
                }
            }
        }

        // a bar without a close is marked at the last known price
        if let Some(price) = last_price {
            state.mark(price);
        }

        equity_curve.push(EquityPoint {
            timestamp: candle.timestamp,
            cash: state.cash,
            coin: state.coin,
            equity: state.equity,
            max_drawdown: state.max_drawdown,
        });
    }

    let result = BacktestResult::from_state(
        params,
        &state,
        equity_curve.len(),
        skipped_intents,
        fills,
        equity_curve,
    );

    info!(
        strategy = strategy.name(),
        bars = result.bars_evaluated,
        trades = result.total_trades(),
        skipped = result.skipped_intents,
        final_equity = %result.final_equity,
        yield_pct = %result.yield_pct_display(),
        max_drawdown_pct = %result.max_drawdown_pct_display(),
        "Backtest complete"
    );

    result
}

fn execute(
    state: &mut PortfolioState,
    intent: &OrderIntent,
    timestamp: DateTime<Utc>,
    price: Decimal,
    fee_rate: Decimal,
) -> Option<Fill> {
    match intent.side() {
        Side::Buy => state.apply_buy(timestamp, intent.notional()?, price, fee_rate),
        Side::Sell => state.apply_sell(timestamp, intent.quantity()?, price, fee_rate),
    }
}
