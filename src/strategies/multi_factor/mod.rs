//! Multi-Factor Strategy
//!
//! Combines trend (SMA cross), RSI, volume expansion, Bollinger bands and
//! momentum into a single BUY/SELL decision per bar.

mod config;
mod strategy;

pub use config::{MultiFactorConfig, Preset};
pub use strategy::MultiFactorStrategy;

use crate::{Config, Strategy};
use anyhow::Result;

/// Create strategy from config (called by registry)
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_config = MultiFactorConfig::from_value(&config.strategy)
        .map_err(|e| anyhow::anyhow!("Failed to parse multi_factor config: {:#}", e))?;
    Ok(Box::new(MultiFactorStrategy::new(strategy_config)))
}
