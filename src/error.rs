//! Error types for the signal engine and the simulator

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Symbol;

/// Failure reported by a sizing, balance or exchange-limits collaborator.
///
/// The engine never propagates these: order construction logs them and
/// produces no intent for the bar.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("balance unavailable for {market}: {reason}")]
    BalanceUnavailable { market: Symbol, reason: String },

    #[error("exchange limits unavailable for {market}: {reason}")]
    LimitsUnavailable { market: Symbol, reason: String },

    #[error("position sizing failed: {0}")]
    Sizing(String),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Invalid parameters for a backtest run
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BacktestError {
    #[error("initial cash must be positive, got {0}")]
    NonPositiveInitialCash(Decimal),

    #[error("fee rate must be in [0, 1), got {0}")]
    InvalidFeeRate(Decimal),
}
