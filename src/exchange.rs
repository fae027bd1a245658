//! Exchange-side collaborators
//!
//! The engine never talks to an exchange directly. It reads account balances
//! and per-market order limits through the two traits below; live adapters
//! implement them against a REST API, the simulator implements them over its
//! own portfolio, and [`StaticExchange`] serves fixed values.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorResult;
use crate::types::Symbol;

/// Per-market order limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLimits {
    /// Largest cash amount a single market buy may spend
    pub max_buy_notional: Decimal,
    /// Largest coin quantity a single market sell may carry
    pub max_sell_quantity: Decimal,
}

impl Default for ExchangeLimits {
    fn default() -> Self {
        Self {
            max_buy_notional: dec!(100000000),
            max_sell_quantity: dec!(100),
        }
    }
}

/// Account balances as seen by the strategy
pub trait AccountSource {
    /// Coin held for `market` (e.g. BTC for `KRW-BTC`)
    fn coin_balance(&self, market: &Symbol) -> CollaboratorResult<Decimal>;

    /// Cash plus the value of every coin holding, in quote currency
    fn total_asset_value(&self) -> CollaboratorResult<Decimal>;
}

/// Source of per-market order limits
pub trait ExchangeLimitsSource {
    fn limits(&self, market: &Symbol) -> CollaboratorResult<ExchangeLimits>;
}

impl ExchangeLimitsSource for ExchangeLimits {
    fn limits(&self, _market: &Symbol) -> CollaboratorResult<ExchangeLimits> {
        Ok(*self)
    }
}

/// Exchange stand-in with fixed limits and a fixed account
#[derive(Debug, Clone)]
pub struct StaticExchange {
    pub limits: ExchangeLimits,
    pub coin_balance: Decimal,
    pub total_assets: Decimal,
}

impl StaticExchange {
    pub fn new(limits: ExchangeLimits) -> Self {
        Self {
            limits,
            coin_balance: Decimal::ZERO,
            total_assets: Decimal::ZERO,
        }
    }

    pub fn with_coin_balance(mut self, balance: Decimal) -> Self {
        self.coin_balance = balance;
        self
    }

    pub fn with_total_assets(mut self, total: Decimal) -> Self {
        self.total_assets = total;
        self
    }
}

impl Default for StaticExchange {
    fn default() -> Self {
        Self::new(ExchangeLimits::default()).with_total_assets(dec!(10000000))
    }
}

impl AccountSource for StaticExchange {
    fn coin_balance(&self, _market: &Symbol) -> CollaboratorResult<Decimal> {
        Ok(self.coin_balance)
    }

    fn total_asset_value(&self) -> CollaboratorResult<Decimal> {
        Ok(self.total_assets)
    }
}

impl ExchangeLimitsSource for StaticExchange {
    fn limits(&self, _market: &Symbol) -> CollaboratorResult<ExchangeLimits> {
        Ok(self.limits)
    }
}
