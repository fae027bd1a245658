//! Optimize command implementation

use anyhow::Result;
use coin_signal_engine::grid;
use coin_signal_engine::optimizer::{Optimizer, SortBy};
use tracing::info;

pub fn run(
    data_path: String,
    config_path: Option<String>,
    sort_by: String,
    top: usize,
    overrides: Vec<String>,
    sequential: bool,
) -> Result<()> {
    info!("Starting optimization");

    let sort_by: SortBy = sort_by.parse()?;
    let mut config = super::load_config(config_path.as_deref())?;
    grid::apply_overrides(&mut config, &overrides);

    let candles = super::load_series(&data_path, &config)?;

    let configs = grid::generate_grid_configs(&config);
    info!("Strategy: {}", config.strategy_name);
    println!(
        "Testing {} parameter combinations on {} candles",
        configs.len(),
        candles.len()
    );

    let optimizer = Optimizer::new().with_progress(true);
    let mut results = if sequential {
        optimizer.optimize_sequential(&candles, &configs)
    } else {
        optimizer.optimize(&candles, &configs)
    };

    if results.is_empty() {
        anyhow::bail!("No valid parameter combination produced a result");
    }

    Optimizer::sort_results(&mut results, sort_by);

    println!("\n{}", "=".repeat(100));
    println!("TOP {} RESULTS (sorted by {:?})", top.min(results.len()), sort_by);
    println!("{}", "=".repeat(100));
    println!(
        "{:>4} {:>10} {:>10} {:>7} {:>16}  Params",
        "#", "Yield%", "MDD%", "Trades", "Final Equity"
    );

    for (i, r) in results.iter().take(top).enumerate() {
        println!(
            "{:>4} {:>10.2} {:>10.2} {:>7} {:>16.0}  {}",
            i + 1,
            r.yield_pct,
            r.max_drawdown_pct,
            r.total_trades,
            r.final_equity,
            grid::format_params(&r.params)
        );
    }
    println!("{}", "=".repeat(100));

    info!("Optimization completed: {} results", results.len());

    Ok(())
}
