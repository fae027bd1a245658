//! Coin signal engine - main entry point
//!
//! This binary provides three subcommands:
//! - backtest: Replay a candle file through the strategy
//! - signal: Evaluate the latest window once and print the order intent
//! - optimize: Sweep strategy parameters over the config's grid

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "coin-signal-engine")]
#[command(about = "Multi-factor coin trading signals with backtesting and parameter sweeps", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run strategy backtest
    Backtest {
        /// Candle file (.csv or .json)
        #[arg(short, long)]
        data: String,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Initial cash
        #[arg(long)]
        capital: Option<Decimal>,

        /// Fee rate per fill, e.g. 0.0005
        #[arg(long)]
        fee: Option<Decimal>,

        /// Leading bars that are never evaluated
        #[arg(long)]
        warmup: Option<usize>,

        /// Strategy preset (momentum or classic)
        #[arg(long)]
        preset: Option<String>,

        /// Do not append the result row to the results file
        #[arg(long)]
        no_log_result: bool,
    },

    /// Evaluate the latest candle window once
    Signal {
        /// Candle file (.csv or .json)
        #[arg(short, long)]
        data: String,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Coin currently held
        #[arg(long)]
        balance: Option<Decimal>,
    },

    /// Optimize strategy parameters
    Optimize {
        /// Candle file (.csv or .json)
        #[arg(short, long)]
        data: String,

        /// Path to base configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Sort results by metric (yield, drawdown)
        #[arg(long, default_value = "yield")]
        sort_by: String,

        /// Number of top results to show
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Grid override, e.g. -O ma_short=5,9,12 (repeatable)
        #[arg(short = 'O', long = "override")]
        overrides: Vec<String>,

        /// Run sequentially instead of parallel
        #[arg(long)]
        sequential: bool,
    },
}

/// Subscriber writing to `file_writer`, plus the console unless `file_only`
fn build_subscriber<W>(
    env_filter: EnvFilter,
    file_writer: W,
    file_only: bool,
) -> Box<dyn tracing::Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if file_only {
        // Keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        Box::new(tracing_subscriber::registry().with(env_filter).with(file_layer))
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // same format as the console, without ANSI colors
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        Box::new(
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer),
        )
    }
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);
    tracing::subscriber::set_global_default(build_subscriber(env_filter, file_appender, file_only))
        .context("Failed to install the log subscriber")?;

    if !file_only {
        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Signal { .. } => ("signal", false),
        Commands::Optimize { .. } => ("optimize", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            data,
            config,
            capital,
            fee,
            warmup,
            preset,
            no_log_result,
        } => commands::backtest::run(data, config, capital, fee, warmup, preset, no_log_result),

        Commands::Signal {
            data,
            config,
            balance,
        } => commands::signal::run(data, config, balance),

        Commands::Optimize {
            data,
            config,
            sort_by,
            top,
            overrides,
            sequential,
        } => commands::optimize::run(data, config, sort_by, top, overrides, sequential),
    }
}
