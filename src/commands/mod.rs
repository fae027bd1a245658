//! Subcommand implementations

pub mod backtest;
pub mod optimize;
pub mod signal;

use anyhow::Result;
use coin_signal_engine::{aggregate, data, Candle, Config};
use tracing::info;

/// Load the config file if one was given, otherwise defaults plus environment overrides
pub fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded configuration from: {}", path);
            Ok(config)
        }
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            info!("No config file given, using defaults");
            Ok(config)
        }
    }
}

/// Load candles, report data problems, and resample to 1-minute bars when needed
pub fn load_series(path: &str, config: &Config) -> Result<Vec<Candle>> {
    let candles = data::load_candles(path, &config.market())?;
    if candles.is_empty() {
        anyhow::bail!("No candles in {}", path);
    }
    if !data::validate_candles(&candles).report() {
        tracing::warn!("Continuing with candle data that failed validation");
    }
    Ok(aggregate::aggregate_if_needed(candles))
}
