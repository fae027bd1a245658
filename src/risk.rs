//! Position sizing
//!
//! A sizer answers one question: how much cash should the next market buy
//! spend? Sizing is currency-agnostic; the returned notional is in the same
//! quote currency as the account it was computed from.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::SizingConfig;
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::exchange::AccountSource;
use crate::types::truncate;

/// Buy-notional sizing collaborator
pub trait PositionSizer: Send + Sync {
    fn buy_notional(&self, account: &dyn AccountSource) -> CollaboratorResult<Decimal>;
}

/// Always spends the same notional (the simulator's default)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedNotionalSizer {
    pub notional: Decimal,
}

impl FixedNotionalSizer {
    pub const DEFAULT_NOTIONAL: Decimal = dec!(2000000);

    pub fn new(notional: Decimal) -> Self {
        Self { notional }
    }
}

impl Default for FixedNotionalSizer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NOTIONAL)
    }
}

impl PositionSizer for FixedNotionalSizer {
    fn buy_notional(&self, _account: &dyn AccountSource) -> CollaboratorResult<Decimal> {
        Ok(self.notional)
    }
}

/// Spends a fixed fraction of total account value, rounded down to whole units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskFractionSizer {
    pub fraction: Decimal,
}

impl RiskFractionSizer {
    pub const DEFAULT_FRACTION: Decimal = dec!(0.02);

    pub fn new(fraction: Decimal) -> Self {
        Self { fraction }
    }
}

impl Default for RiskFractionSizer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRACTION)
    }
}

impl PositionSizer for RiskFractionSizer {
    fn buy_notional(&self, account: &dyn AccountSource) -> CollaboratorResult<Decimal> {
        if self.fraction < Decimal::ZERO || self.fraction > Decimal::ONE {
            return Err(CollaboratorError::Sizing(format!(
                "risk fraction {} outside [0, 1]",
                self.fraction
            )));
        }

        let total = account.total_asset_value()?;
        Ok(truncate(total * self.fraction, 0))
    }
}

/// Build the sizer described by the trading config
pub fn sizer_from_config(config: &SizingConfig) -> Box<dyn PositionSizer> {
    match *config {
        SizingConfig::Fixed { notional } => Box::new(FixedNotionalSizer::new(notional)),
        SizingConfig::RiskFraction { fraction } => Box::new(RiskFractionSizer::new(fraction)),
    }
}
