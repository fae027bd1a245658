//! Parameter sweep
//!
//! Runs one independent backtest per grid config. Runs share only the
//! read-only candle slice, so they parallelize with rayon.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::backtest::Backtester;
use crate::strategies::create_strategy;
use crate::{Candle, Config};

/// Optimization result for a single parameter combination
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub params: BTreeMap<String, String>,
    pub final_equity: Decimal,
    pub yield_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub total_trades: usize,
}

/// Metric to rank results by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Highest yield first
    #[default]
    Yield,
    /// Smallest max drawdown first
    Drawdown,
}

impl FromStr for SortBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yield" | "return" => Ok(SortBy::Yield),
            "drawdown" | "mdd" => Ok(SortBy::Drawdown),
            other => anyhow::bail!("Unknown sort metric '{}'. Use yield or drawdown", other),
        }
    }
}

/// Grid search driver
pub struct Optimizer {
    show_progress: bool,
}

impl Optimizer {
    pub fn new() -> Self {
        Optimizer {
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Evaluate one config; configs whose strategy or parameters are invalid are dropped
    fn evaluate(candles: &[Candle], config: &Config) -> Option<OptimizationResult> {
        let strategy = match create_strategy(config) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Skipping config: {:#}", e);
                return None;
            }
        };
        let backtester = match Backtester::from_config(config, strategy) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Skipping config: {}", e);
                return None;
            }
        };
        let result = backtester.run(candles);

        Some(OptimizationResult {
            params: crate::grid::extract_params(config),
            final_equity: result.final_equity,
            yield_pct: result.yield_pct,
            max_drawdown_pct: result.max_drawdown_pct,
            total_trades: result.total_trades(),
        })
    }

    /// Run every config in parallel
    pub fn optimize(&self, candles: &[Candle], configs: &[Config]) -> Vec<OptimizationResult> {
        tracing::info!("Testing {} parameter combinations", configs.len());
        let pb = self.progress_bar(configs.len());

        let results = configs
            .par_iter()
            .filter_map(|config| {
                let result = Self::evaluate(candles, config);
                pb.inc(1);
                result
            })
            .collect();

        pb.finish_and_clear();
        results
    }

    /// Run optimization sequentially (for debugging)
    pub fn optimize_sequential(
        &self,
        candles: &[Candle],
        configs: &[Config],
    ) -> Vec<OptimizationResult> {
        tracing::info!(
            "Testing {} parameter combinations sequentially",
            configs.len()
        );
        let pb = self.progress_bar(configs.len());

        let results = configs
            .iter()
            .filter_map(|config| {
                let result = Self::evaluate(candles, config);
                pb.inc(1);
                result
            })
            .collect();

        pb.finish_and_clear();
        results
    }

    /// Sort optimization results by specified metric
    pub fn sort_results(results: &mut [OptimizationResult], sort_by: SortBy) {
        match sort_by {
            SortBy::Yield => results.sort_by(|a, b| b.yield_pct.cmp(&a.yield_pct)),
            SortBy::Drawdown => results.sort_by(|a, b| {
                a.max_drawdown_pct
                    .cmp(&b.max_drawdown_pct)
                    .then_with(|| b.yield_pct.cmp(&a.yield_pct))
            }),
        }
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
