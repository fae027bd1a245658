//! Signal command: evaluate the latest window once

use anyhow::{Context, Result};
use coin_signal_engine::engine::SignalEngine;
use coin_signal_engine::exchange::StaticExchange;
use rust_decimal::Decimal;
use tracing::info;

pub fn run(data_path: String, config_path: Option<String>, balance: Option<Decimal>) -> Result<()> {
    let config = super::load_config(config_path.as_deref())?;
    let candles = super::load_series(&data_path, &config)?;

    let exchange = StaticExchange::new(config.exchange.limits())
        .with_coin_balance(balance.unwrap_or(Decimal::ZERO))
        .with_total_assets(config.backtest.initial_cash);

    let engine = SignalEngine::from_config(
        &config,
        Box::new(exchange.clone()),
        Box::new(exchange),
    )?;

    info!(
        "Evaluating {} candles with {}",
        candles.len(),
        engine.strategy().name()
    );

    match engine.generate_signal(&candles) {
        Some(intent) => {
            let json =
                serde_json::to_string_pretty(&intent).context("Failed to serialize intent")?;
            println!("{}", json);
        }
        None => println!("HOLD"),
    }

    Ok(())
}
