//! Data loading and result logging
//!
//! Reads historical candles from CSV or exchange-format JSON and appends one
//! summary row per backtest run to a results CSV.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::{info, warn};

use crate::backtest::BacktestResult;
use crate::types::round_half_up;
use crate::{Candle, Symbol};

// =============================================================================
// Constants
// =============================================================================

/// Header of the results log
pub const RESULT_HEADER: [&str; 4] = ["datetime", "yield_pct", "max_drawdown_pct", "final_equity"];

/// Timestamp layouts accepted without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Timestamp layouts carrying a UTC offset
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

// =============================================================================
// Loading
// =============================================================================

/// Load candles from a `.csv` or `.json` file
pub fn load_candles(path: impl AsRef<Path>, market: &Symbol) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let candles = match extension.as_deref() {
        Some("csv") => load_csv(path, market)?,
        Some("json") => load_json(path, market)?,
        _ => bail!("Unsupported data file extension: {}", path.display()),
    };

    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// Parse a candle timestamp. An offset, when present, is dropped and the wall
/// clock time is kept, matching exchange files that mix KST strings with and
/// without `+09:00`.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.naive_local().and_utc());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ndt.and_utc());
        }
    }

    bail!("Failed to parse datetime: {}", s)
}

fn parse_decimal(field: Option<&str>, name: &str, row: usize) -> Result<Decimal> {
    let raw = field.with_context(|| format!("Row {}: missing {} column", row, name))?;
    raw.trim()
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .with_context(|| format!("Row {}: failed to parse {} '{}'", row, name, raw))
}

/// Load OHLCV data from CSV (header row, then timestamp, open, high, low, close, volume)
pub fn load_csv(path: impl AsRef<Path>, market: &Symbol) -> Result<Vec<Candle>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path.as_ref())
        .context("Failed to open CSV file")?;

    let mut candles = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Failed to read row {}", row))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let timestamp = parse_timestamp(dt_str).with_context(|| format!("Row {}", row))?;

        let close = match record.get(4) {
            Some(s) if s.trim().is_empty() => None,
            other => Some(parse_decimal(other, "close", row)?),
        };

        candles.push(Candle::new_unchecked(
            market.clone(),
            timestamp,
            parse_decimal(record.get(1), "open", row)?,
            parse_decimal(record.get(2), "high", row)?,
            parse_decimal(record.get(3), "low", row)?,
            close,
            parse_decimal(record.get(5), "volume", row)?,
        ));
    }

    Ok(candles)
}

/// One element of an exchange candle API response
#[derive(Debug, Deserialize)]
struct ExchangeCandle {
    #[serde(default)]
    market: Option<String>,
    candle_date_time_kst: String,
    opening_price: Decimal,
    high_price: Decimal,
    low_price: Decimal,
    #[serde(default)]
    trade_price: Option<Decimal>,
    candle_acc_trade_volume: Decimal,
}

/// Load an exchange candle array (newest first, as the API returns it) in ascending order
pub fn load_json(path: impl AsRef<Path>, market: &Symbol) -> Result<Vec<Candle>> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read JSON file")?;
    let raw: Vec<ExchangeCandle> =
        serde_json::from_str(&contents).context("Failed to parse candle JSON")?;

    let mut candles = raw
        .into_iter()
        .map(|c| {
            let timestamp = parse_timestamp(&c.candle_date_time_kst)?;
            let market = c.market.as_deref().map(Symbol::new).unwrap_or_else(|| market.clone());
            Ok(Candle::new_unchecked(
                market,
                timestamp,
                c.opening_price,
                c.high_price,
                c.low_price,
                c.trade_price,
                c.candle_acc_trade_volume,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

// =============================================================================
// Data Validation
// =============================================================================

/// Validate candle data for consistency
pub fn validate_candles(candles: &[Candle]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if candles.is_empty() {
        errors.push("No candles provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, candle) in candles.iter().enumerate() {
        if let Err(e) = candle.validate() {
            errors.push(format!("Candle {}: {}", i, e));
        }
        if candle.close.is_none() {
            warnings.push(format!("Candle {}: missing close", i));
        }
        if i > 0 && candle.timestamp <= candles[i - 1].timestamp {
            warnings.push(format!("Candle {}: not chronological", i));
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Log every finding; returns whether the data is usable
    pub fn report(&self) -> bool {
        for w in self.warnings.iter().take(10) {
            warn!("{}", w);
        }
        if self.warnings.len() > 10 {
            warn!("... and {} more warnings", self.warnings.len() - 10);
        }
        for e in self.errors.iter().take(10) {
            warn!("Invalid candle data: {}", e);
        }
        self.is_valid()
    }
}

// =============================================================================
// Result log
// =============================================================================

/// Append a run summary to the results CSV, writing the header on first use
pub fn append_result_row(path: impl AsRef<Path>, result: &BacktestResult) -> Result<()> {
    append_result_row_at(path, result, Utc::now())
}

/// [`append_result_row`] with an explicit run timestamp
pub fn append_result_row_at(
    path: impl AsRef<Path>,
    result: &BacktestResult,
    at: DateTime<Utc>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let write_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if write_header {
        writer.write_record(RESULT_HEADER)?;
    }
    writer.write_record([
        at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        format!("{:.2}", round_half_up(result.yield_pct, 2)),
        format!("{:.2}", round_half_up(result.max_drawdown_pct, 2)),
        result.final_equity.normalize().to_string(),
    ])?;
    writer.flush().context("Failed to write result row")?;

    info!("Result row appended to {}", path.display());
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
