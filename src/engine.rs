//! Signal engine facade
//!
//! Bundles a strategy with its live collaborators so an external scheduler
//! can call [`SignalEngine::generate_signal`] once per bar.

use anyhow::Result;

use crate::config::Config;
use crate::exchange::{AccountSource, ExchangeLimitsSource};
use crate::risk::{sizer_from_config, PositionSizer};
use crate::strategies::{create_strategy, Strategy, TradingContext};
use crate::{Candle, OrderIntent};

pub struct SignalEngine {
    strategy: Box<dyn Strategy>,
    sizer: Box<dyn PositionSizer>,
    account: Box<dyn AccountSource + Send + Sync>,
    limits: Box<dyn ExchangeLimitsSource + Send + Sync>,
}

impl SignalEngine {
    pub fn new(
        strategy: Box<dyn Strategy>,
        sizer: Box<dyn PositionSizer>,
        account: Box<dyn AccountSource + Send + Sync>,
        limits: Box<dyn ExchangeLimitsSource + Send + Sync>,
    ) -> Self {
        Self {
            strategy,
            sizer,
            account,
            limits,
        }
    }

    /// Build the configured strategy and sizer around the given exchange collaborators
    pub fn from_config(
        config: &Config,
        account: Box<dyn AccountSource + Send + Sync>,
        limits: Box<dyn ExchangeLimitsSource + Send + Sync>,
    ) -> Result<Self> {
        let strategy = create_strategy(config)?;
        let sizer = sizer_from_config(&config.trading.sizing);
        Ok(Self::new(strategy, sizer, account, limits))
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    /// Evaluate the window ending at the latest candle
    pub fn generate_signal(&self, candles: &[Candle]) -> Option<OrderIntent> {
        let ctx = TradingContext::new(
            self.sizer.as_ref(),
            self.account.as_ref(),
            self.limits.as_ref(),
        );
        let intent = self.strategy.produce_signal(candles, &ctx);
        if let Some(ref intent) = intent {
            tracing::info!(strategy = self.strategy.name(), %intent, "Signal");
        }
        intent
    }
}
