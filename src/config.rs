//! Configuration management
//!
//! Loads the JSON configuration file and applies environment overrides for
//! deployment-specific values (market symbol, result log location).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::exchange::ExchangeLimits;
use crate::types::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_strategy_name")]
    pub strategy_name: String,
    /// Strategy parameters, parsed by the selected strategy's factory
    #[serde(default = "default_strategy_params")]
    pub strategy: serde_json::Value,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// Grid search parameters for optimization (optional)
    /// Each key is a strategy param name, value is array of values to test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<HashMap<String, Vec<serde_json::Value>>>,
}

fn default_strategy_name() -> String {
    "multi_factor".to_string()
}

fn default_strategy_params() -> serde_json::Value {
    serde_json::json!({})
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override deployment values from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(market) = std::env::var("TRADER_MARKET") {
            if !market.trim().is_empty() {
                self.trading.market = market.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("TRADER_RESULTS_PATH") {
            if !path.trim().is_empty() {
                self.backtest.results_path = PathBuf::from(path.trim());
            }
        }
    }

    /// Name of the strategy to build from the registry
    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    pub fn market(&self) -> Symbol {
        Symbol::new(&self.trading.market)
    }

    /// Set a single strategy parameter, creating the object if needed
    pub fn set_strategy_param(&mut self, key: &str, value: serde_json::Value) {
        if !self.strategy.is_object() {
            self.strategy = default_strategy_params();
        }
        if let Some(obj) = self.strategy.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strategy_name: default_strategy_name(),
            strategy: default_strategy_params(),
            trading: TradingConfig::default(),
            exchange: ExchangeConfig::default(),
            backtest: BacktestConfig::default(),
            grid: None,
        }
    }
}

/// How the buy notional is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizingConfig {
    /// Spend the same cash amount on every buy
    Fixed {
        #[serde(default = "default_fixed_notional")]
        notional: Decimal,
    },
    /// Spend a fraction of total account value
    RiskFraction {
        #[serde(default = "default_risk_fraction")]
        fraction: Decimal,
    },
}

fn default_fixed_notional() -> Decimal {
    dec!(2000000)
}

fn default_risk_fraction() -> Decimal {
    dec!(0.02)
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig::Fixed {
            notional: default_fixed_notional(),
        }
    }
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default)]
    pub sizing: SizingConfig,
}

fn default_market() -> String {
    "KRW-BTC".to_string()
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            market: default_market(),
            sizing: SizingConfig::default(),
        }
    }
}

/// Exchange fee and order limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Fraction of notional charged per trade (0.0005 = 0.05%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    #[serde(default = "default_max_buy_notional")]
    pub max_buy_notional: Decimal,
    #[serde(default = "default_max_sell_quantity")]
    pub max_sell_quantity: Decimal,
}

fn default_fee_rate() -> Decimal {
    dec!(0.0005)
}

fn default_max_buy_notional() -> Decimal {
    ExchangeLimits::default().max_buy_notional
}

fn default_max_sell_quantity() -> Decimal {
    ExchangeLimits::default().max_sell_quantity
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            fee_rate: default_fee_rate(),
            max_buy_notional: default_max_buy_notional(),
            max_sell_quantity: default_max_sell_quantity(),
        }
    }
}

impl ExchangeConfig {
    pub fn limits(&self) -> ExchangeLimits {
        ExchangeLimits {
            max_buy_notional: self.max_buy_notional,
            max_sell_quantity: self.max_sell_quantity,
        }
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// Leading bars the simulator never evaluates
    #[serde(default = "default_warmup_bars")]
    pub warmup_bars: usize,
    /// CSV file each run appends its summary row to
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_initial_cash() -> Decimal {
    dec!(10000000)
}

fn default_warmup_bars() -> usize {
    50
}

fn default_results_path() -> PathBuf {
    PathBuf::from("data").join("result.csv")
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: default_initial_cash(),
            warmup_bars: default_warmup_bars(),
            results_path: default_results_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.strategy_name(), "multi_factor");
        assert_eq!(config.trading.market, "KRW-BTC");
        assert_eq!(config.exchange.fee_rate, dec!(0.0005));
        assert_eq!(config.backtest.initial_cash, dec!(10000000));
        assert_eq!(config.backtest.warmup_bars, 50);
        assert_eq!(config.trading.sizing, SizingConfig::default());
        assert!(config.grid.is_none());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.strategy_name, "multi_factor");
        assert_eq!(config.exchange.max_buy_notional, dec!(100000000));
        assert_eq!(config.exchange.max_sell_quantity, dec!(100));
    }

    #[test]
    fn test_parse_sections() {
        let json = r#"{
            "strategy": { "preset": "classic", "rsi_buy_max": 30 },
            "trading": {
                "market": "KRW-ETH",
                "sizing": { "mode": "risk_fraction", "fraction": 0.05 }
            },
            "exchange": { "fee_rate": 0.001 },
            "backtest": { "initial_cash": 5000000, "warmup_bars": 30 },
            "grid": { "rsi_buy_max": [30, 35, 40] }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.market(), Symbol::new("KRW-ETH"));
        assert_eq!(
            config.trading.sizing,
            SizingConfig::RiskFraction {
                fraction: dec!(0.05)
            }
        );
        assert_eq!(config.exchange.fee_rate, dec!(0.001));
        assert_eq!(config.exchange.max_sell_quantity, dec!(100));
        assert_eq!(config.backtest.initial_cash, dec!(5000000));
        assert_eq!(config.backtest.warmup_bars, 30);
        assert_eq!(config.grid.as_ref().map(|g| g.len()), Some(1));
        assert_eq!(config.strategy["preset"], "classic");
    }

    #[test]
    fn test_fixed_sizing_default_notional() {
        let sizing: SizingConfig = serde_json::from_str(r#"{ "mode": "fixed" }"#).unwrap();
        assert_eq!(
            sizing,
            SizingConfig::Fixed {
                notional: dec!(2000000)
            }
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "backtest": {{ "warmup_bars": 10 }} }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.backtest.warmup_bars, 10);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_set_strategy_param() {
        let mut config = Config::default();
        config.set_strategy_param("ma_short", serde_json::json!(5));
        assert_eq!(config.strategy["ma_short"], 5);
    }
}
