//! Trading Strategies Module
//!
//! Strategy framework with:
//! - A single trait every strategy implements
//! - Dynamic strategy registry (no hardcoded names at call sites)
//! - The collaborators a strategy may consult while building an order

pub mod multi_factor;

use crate::exchange::{AccountSource, ExchangeLimitsSource};
use crate::risk::PositionSizer;
use crate::{Candle, Config, OrderIntent};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

// =============================================================================
// Trading context - collaborators handed to a strategy per evaluation
// =============================================================================

/// Everything outside the candle window a strategy may consult.
///
/// Borrowed for one evaluation only; strategies keep no state between bars.
#[derive(Clone, Copy)]
pub struct TradingContext<'a> {
    pub sizer: &'a dyn PositionSizer,
    pub account: &'a dyn AccountSource,
    pub limits: &'a dyn ExchangeLimitsSource,
}

impl<'a> TradingContext<'a> {
    pub fn new(
        sizer: &'a dyn PositionSizer,
        account: &'a dyn AccountSource,
        limits: &'a dyn ExchangeLimitsSource,
    ) -> Self {
        Self {
            sizer,
            account,
            limits,
        }
    }
}

// =============================================================================
// Strategy Trait - The contract all strategies must implement
// =============================================================================

/// Trading strategy trait
pub trait Strategy: Send + Sync {
    /// Strategy identifier (must match config's strategy_name)
    fn name(&self) -> &'static str;

    /// Shortest window for which the strategy can decide anything
    fn min_candles(&self) -> usize;

    /// Evaluate the window ending at the latest candle.
    ///
    /// Returns at most one order. Collaborator failures are absorbed and
    /// reported as `None`.
    fn produce_signal(&self, candles: &[Candle], ctx: &TradingContext<'_>) -> Option<OrderIntent>;
}

// =============================================================================
// Strategy Factory - Type alias for strategy constructor functions
// =============================================================================

/// Factory function type for creating strategies from config
pub type StrategyFactory = fn(&Config) -> Result<Box<dyn Strategy>>;

// =============================================================================
// Strategy Registry - Dynamic registration without hardcoding
// =============================================================================

type Registry = RwLock<HashMap<&'static str, StrategyFactory>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("multi_factor", multi_factor::create as StrategyFactory);
        RwLock::new(map)
    })
}

/// Create a strategy from configuration
pub fn create_strategy(config: &Config) -> Result<Box<dyn Strategy>> {
    let factory = {
        let registry = get_registry()
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let strategy_name = config.strategy_name();
        *registry.get(strategy_name).ok_or_else(|| {
            let mut available: Vec<_> = registry.keys().copied().collect();
            available.sort_unstable();
            anyhow::anyhow!(
                "Unknown strategy: '{}'. Available: {}",
                strategy_name,
                available.join(", ")
            )
        })?
    };

    factory(config)
}

/// Get list of available strategy names
pub fn available_strategies() -> Vec<&'static str> {
    let mut names: Vec<_> = get_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .copied()
        .collect();
    names.sort_unstable();
    names
}

/// Register a new strategy (for plugins or testing)
pub fn register_strategy(name: &'static str, factory: StrategyFactory) {
    get_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name, factory);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverTrades;

    impl Strategy for NeverTrades {
        fn name(&self) -> &'static str {
            "never_trades"
        }

        fn min_candles(&self) -> usize {
            1
        }

        fn produce_signal(&self, _: &[Candle], _: &TradingContext<'_>) -> Option<OrderIntent> {
            None
        }
    }

    fn create_never_trades(_: &Config) -> Result<Box<dyn Strategy>> {
        Ok(Box::new(NeverTrades))
    }

    #[test]
    fn test_default_strategy_is_registered() {
        assert!(available_strategies().contains(&"multi_factor"));
        let strategy = create_strategy(&Config::default()).unwrap();
        assert_eq!(strategy.name(), "multi_factor");
    }

    #[test]
    fn test_unknown_strategy_lists_available() {
        let config = Config {
            strategy_name: "does_not_exist".to_string(),
            ..Config::default()
        };
        let err = create_strategy(&config).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("does_not_exist"));
        assert!(message.contains("multi_factor"));
    }

    #[test]
    fn test_register_strategy() {
        register_strategy("never_trades", create_never_trades);
        let config = Config {
            strategy_name: "never_trades".to_string(),
            ..Config::default()
        };
        let strategy = create_strategy(&config).unwrap();
        assert_eq!(strategy.name(), "never_trades");
        assert_eq!(strategy.min_candles(), 1);
    }
}
