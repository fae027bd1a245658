//! Multi-factor strategy configuration and named presets

use anyhow::{ensure, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Named, complete parameter sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Tighter RSI bands plus a momentum filter
    #[default]
    Momentum,
    /// Wider RSI bands, stronger volume requirement, no momentum filter
    Classic,
}

impl Preset {
    pub fn config(self) -> MultiFactorConfig {
        match self {
            Preset::Momentum => MultiFactorConfig::default(),
            Preset::Classic => MultiFactorConfig {
                rsi_buy_max: dec!(35),
                rsi_sell_min: dec!(65),
                volume_multiplier_min: dec!(1.10),
                momentum_min: None,
                ..MultiFactorConfig::default()
            },
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "momentum" => Ok(Preset::Momentum),
            "classic" => Ok(Preset::Classic),
            other => anyhow::bail!("Unknown preset '{}'. Available: momentum, classic", other),
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preset::Momentum => write!(f, "momentum"),
            Preset::Classic => write!(f, "classic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFactorConfig {
    /// Short SMA period (default: 9)
    pub ma_short: usize,

    /// Long SMA period (default: 26)
    pub ma_long: usize,

    /// RSI lookback in close-to-close transitions (default: 14)
    pub rsi_period: usize,

    /// ATR period (default: 14)
    pub atr_period: usize,

    /// Bollinger band period (default: 20)
    pub bb_period: usize,

    /// Bollinger band width in standard deviations (default: 2)
    pub bb_std_devs: Decimal,

    /// Volume averaging period (default: 20)
    pub volume_period: usize,

    /// Momentum lookback (default: 10)
    pub momentum_period: usize,

    /// Buy only when RSI is at or below this (default: 40)
    pub rsi_buy_max: Decimal,

    /// Sell when RSI is above this (default: 70)
    pub rsi_sell_min: Decimal,

    /// RSI level that confirms an upper-band sell (default: 60)
    pub rsi_confirm_min: Decimal,

    /// Minimum latest-volume / average-volume ratio for a buy (default: 1.05)
    pub volume_multiplier_min: Decimal,

    /// Momentum ratio a buy must exceed; `None` disables the filter (default: 1.0025)
    pub momentum_min: Option<Decimal>,

    /// Require close <= lower Bollinger band for a buy (default: true)
    pub lower_band_filter: bool,
}

impl Default for MultiFactorConfig {
    fn default() -> Self {
        Self {
            ma_short: 9,
            ma_long: 26,
            rsi_period: 14,
            atr_period: 14,
            bb_period: 20,
            bb_std_devs: dec!(2),
            volume_period: 20,
            momentum_period: 10,
            rsi_buy_max: dec!(40),
            rsi_sell_min: dec!(70),
            rsi_confirm_min: dec!(60),
            volume_multiplier_min: dec!(1.05),
            momentum_min: Some(dec!(1.0025)),
            lower_band_filter: true,
        }
    }
}

impl MultiFactorConfig {
    /// Parse a strategy section: an optional `"preset"` name plus field overrides.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let preset = match value.get("preset") {
            Some(serde_json::Value::String(name)) => name.parse::<Preset>()?,
            Some(serde_json::Value::Null) | None => Preset::default(),
            Some(other) => anyhow::bail!("'preset' must be a string, got {}", other),
        };

        let mut merged =
            serde_json::to_value(preset.config()).context("Failed to serialize preset")?;
        if let (Some(base), Some(overrides)) = (merged.as_object_mut(), value.as_object()) {
            for (key, v) in overrides {
                if key != "preset" {
                    base.insert(key.clone(), v.clone());
                }
            }
        }

        let config: MultiFactorConfig =
            serde_json::from_value(merged).context("Failed to parse multi_factor config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("ma_short", self.ma_short),
            ("ma_long", self.ma_long),
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
            ("bb_period", self.bb_period),
            ("volume_period", self.volume_period),
            ("momentum_period", self.momentum_period),
        ];
        for (name, period) in periods {
            ensure!(period >= 1, "{} must be >= 1", name);
        }

        ensure!(
            self.ma_short < self.ma_long,
            "ma_short ({}) must be less than ma_long ({})",
            self.ma_short,
            self.ma_long
        );

        let hundred = Decimal::ONE_HUNDRED;
        for (name, value) in [
            ("rsi_buy_max", self.rsi_buy_max),
            ("rsi_sell_min", self.rsi_sell_min),
            ("rsi_confirm_min", self.rsi_confirm_min),
        ] {
            ensure!(
                value >= Decimal::ZERO && value <= hundred,
                "{} ({}) must be within [0, 100]",
                name,
                value
            );
        }

        ensure!(
            self.bb_std_devs >= Decimal::ZERO,
            "bb_std_devs must be non-negative"
        );

        Ok(())
    }

    /// Longest window any enabled indicator needs
    pub fn max_period(&self) -> usize {
        let mut required = [
            self.ma_short,
            self.ma_long,
            self.bb_period,
            self.volume_period,
            self.rsi_period + 1,
            self.atr_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        if self.momentum_min.is_some() {
            required = required.max(self.momentum_period + 1);
        }
        required
    }
}
