//! Coin Signal Engine
//!
//! Multi-factor BUY/SELL signal generation over OHLCV candles, with a
//! fee-aware decimal backtest simulator, a sub-minute candle aggregator and
//! grid-search parameter sweeps.

pub mod aggregate;
pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod grid;
pub mod indicators;
pub mod optimizer;
pub mod risk;
pub mod strategies;
pub mod types;

pub use config::Config;
pub use strategies::{Strategy, TradingContext};
pub use types::*;
