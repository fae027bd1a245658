//! Backtest command implementation

use anyhow::{Context, Result};
use coin_signal_engine::backtest::Backtester;
use coin_signal_engine::strategies::{self, multi_factor::Preset};
use coin_signal_engine::data;
use rust_decimal::Decimal;
use tracing::info;

#[allow(clippy::too_many_arguments)]
pub fn run(
    data_path: String,
    config_path: Option<String>,
    capital_override: Option<Decimal>,
    fee_override: Option<Decimal>,
    warmup_override: Option<usize>,
    preset_override: Option<String>,
    no_log_result: bool,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = super::load_config(config_path.as_deref())?;

    // Apply overrides
    if let Some(capital) = capital_override {
        info!("Overriding initial cash to: {}", capital);
        config.backtest.initial_cash = capital;
    }
    if let Some(fee) = fee_override {
        info!("Overriding fee rate to: {}", fee);
        config.exchange.fee_rate = fee;
    }
    if let Some(warmup) = warmup_override {
        info!("Overriding warm-up bars to: {}", warmup);
        config.backtest.warmup_bars = warmup;
    }
    if let Some(preset) = preset_override {
        let preset: Preset = preset.parse()?;
        info!("Using preset: {}", preset);
        config.set_strategy_param("preset", serde_json::json!(preset.to_string()));
    }

    let candles = super::load_series(&data_path, &config)?;
    info!("Evaluating {} candles", candles.len());

    info!("Creating strategy: {}", config.strategy_name);
    let strategy = strategies::create_strategy(&config)?;
    let backtester = Backtester::from_config(&config, strategy)?;

    info!("Running backtest...");
    let result = backtester.run(&candles);

    // Print results
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Market:             {}", config.trading.market);
    println!("Bars Evaluated:     {}", result.bars_evaluated);
    println!("Initial Cash:       {}", result.initial_cash);
    println!("Final Equity:       {}", result.final_equity.normalize());
    println!("Yield:              {:.2}%", result.yield_pct_display());
    println!("Max Drawdown:       {:.2}%", result.max_drawdown_pct_display());
    println!("Total Trades:       {}", result.total_trades());
    println!("Skipped Intents:    {}", result.skipped_intents);
    println!("{}", "=".repeat(60));

    if !no_log_result {
        data::append_result_row(&config.backtest.results_path, &result).with_context(|| {
            format!(
                "Failed to append result to {}",
                config.backtest.results_path.display()
            )
        })?;
    }

    info!("Backtest completed successfully");

    Ok(())
}
