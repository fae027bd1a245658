//! Core data types used across the signal engine and the simulator

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Decimal helpers
// ============================================================================

/// Fixed scale used for every indicator and price quotient.
pub const PRICE_SCALE: u32 = 8;

/// Round to `dp` fractional digits, ties away from zero.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Drop everything past `dp` fractional digits (always toward zero).
pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

// ============================================================================
// Candle
// ============================================================================

/// Validation errors for candle data
#[derive(Debug, Error, PartialEq)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: Decimal, low: Decimal },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(Decimal),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange {
        open: Decimal,
        low: Decimal,
        high: Decimal,
    },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange {
        close: Decimal,
        low: Decimal,
        high: Decimal,
    },

    #[error("prices must be positive: open={open}, high={high}, low={low}")]
    NonPositivePrice {
        open: Decimal,
        high: Decimal,
        low: Decimal,
    },
}

/// OHLCV candle with exact decimal prices.
///
/// `close` is optional because upstream feeds occasionally deliver a bar
/// without a trade price; such a bar is treated as insufficient data rather
/// than as a zero price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub market: Symbol,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Option<Decimal>,
    pub volume: Decimal,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        market: Symbol,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            market,
            timestamp,
            open,
            high,
            low,
            close: Some(close),
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (trusted sources, or bars with a missing close)
    pub fn new_unchecked(
        market: Symbol,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Option<Decimal>,
        volume: Decimal,
    ) -> Self {
        Self {
            market,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= Decimal::ZERO || self.high <= Decimal::ZERO || self.low <= Decimal::ZERO {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < Decimal::ZERO {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if let Some(close) = self.close {
            if close < self.low || close > self.high {
                return Err(CandleValidationError::CloseOutOfRange {
                    close,
                    low: self.low,
                    high: self.high,
                });
            }
        }

        Ok(())
    }

    /// Check if the candle is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

// ============================================================================
// Symbol
// ============================================================================

/// Market symbol using Arc<str> for cheap cloning
///
/// Every candle carries its market, and every intent clones it again, so the
/// clone has to stay O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Order intent
// ============================================================================

/// Trade direction (serialized the way the exchange names order sides)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "bid")]
    Buy,
    #[serde(rename = "ask")]
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// How an order is priced and sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Limit order: quantity at a limit price
    #[serde(rename = "limit")]
    Limit,

    /// Market buy that spends a cash notional
    #[serde(rename = "price")]
    MarketByNotional,

    /// Market sell of a coin quantity
    #[serde(rename = "market")]
    MarketByQuantity,
}

/// Order produced by a strategy evaluation.
///
/// Fields are private so that a market order can only ever carry one sizing
/// field: a notional for buys, a quantity for sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderIntent {
    market: Symbol,
    side: Side,
    #[serde(rename = "ord_type")]
    order_type: OrderType,
    #[serde(
        rename = "volume",
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none"
    )]
    quantity: Option<Decimal>,
    #[serde(
        rename = "price",
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none"
    )]
    price: Option<Decimal>,
}

impl OrderIntent {
    /// Market buy spending `notional` cash
    pub fn market_buy(market: Symbol, notional: Decimal) -> Self {
        Self {
            market,
            side: Side::Buy,
            order_type: OrderType::MarketByNotional,
            quantity: None,
            price: Some(notional),
        }
    }

    /// Market sell of `quantity` coins
    pub fn market_sell(market: Symbol, quantity: Decimal) -> Self {
        Self {
            market,
            side: Side::Sell,
            order_type: OrderType::MarketByQuantity,
            quantity: Some(quantity),
            price: None,
        }
    }

    /// Limit order for `quantity` coins at `limit_price`
    pub fn limit(market: Symbol, side: Side, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            market,
            side,
            order_type: OrderType::Limit,
            quantity: Some(quantity),
            price: Some(limit_price),
        }
    }

    pub fn market(&self) -> &Symbol {
        &self.market
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    /// Cash to spend; only set for market buys
    pub fn notional(&self) -> Option<Decimal> {
        match self.order_type {
            OrderType::MarketByNotional => self.price,
            _ => None,
        }
    }

    /// Coin quantity; set for market sells and limit orders
    pub fn quantity(&self) -> Option<Decimal> {
        self.quantity
    }

    /// Limit price; only set for limit orders
    pub fn limit_price(&self) -> Option<Decimal> {
        match self.order_type {
            OrderType::Limit => self.price,
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.order_type {
            OrderType::MarketByNotional => write!(
                f,
                "{} {} notional={}",
                self.side,
                self.market,
                self.price.unwrap_or_default()
            ),
            OrderType::MarketByQuantity => write!(
                f,
                "{} {} qty={}",
                self.side,
                self.market,
                self.quantity.unwrap_or_default()
            ),
            OrderType::Limit => write!(
                f,
                "{} {} qty={} @ {}",
                self.side,
                self.market,
                self.quantity.unwrap_or_default(),
                self.price.unwrap_or_default()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_round_half_up_and_truncate() {
        assert_eq!(round_half_up(dec!(1.234565), 5), dec!(1.23457));
        assert_eq!(round_half_up(dec!(-1.5), 0), dec!(-2));
        assert_eq!(truncate(dec!(1.999999999), 8), dec!(1.99999999));
        assert_eq!(truncate(dec!(-1.999999999), 8), dec!(-1.99999999));
    }

    #[test]
    fn test_candle_validation() {
        let market = Symbol::new("KRW-BTC");
        let ok = Candle::new(
            market.clone(),
            ts(),
            dec!(100),
            dec!(110),
            dec!(95),
            dec!(105),
            dec!(3),
        );
        assert!(ok.is_ok());

        let inverted = Candle::new(
            market.clone(),
            ts(),
            dec!(100),
            dec!(90),
            dec!(95),
            dec!(92),
            dec!(3),
        );
        assert!(matches!(
            inverted,
            Err(CandleValidationError::HighLessThanLow { .. })
        ));

        let close_out = Candle::new(
            market.clone(),
            ts(),
            dec!(100),
            dec!(110),
            dec!(95),
            dec!(120),
            dec!(3),
        );
        assert!(matches!(
            close_out,
            Err(CandleValidationError::CloseOutOfRange { .. })
        ));

        let negative_volume = Candle::new(
            market,
            ts(),
            dec!(100),
            dec!(110),
            dec!(95),
            dec!(100),
            dec!(-1),
        );
        assert_eq!(
            negative_volume,
            Err(CandleValidationError::NegativeVolume(dec!(-1)))
        );
    }

    #[test]
    fn test_missing_close_is_still_valid() {
        let candle = Candle::new_unchecked(
            Symbol::new("KRW-BTC"),
            ts(),
            dec!(100),
            dec!(110),
            dec!(95),
            None,
            dec!(3),
        );
        assert!(candle.is_valid());
    }

    #[test]
    fn test_market_buy_carries_only_notional() {
        let intent = OrderIntent::market_buy(Symbol::new("KRW-BTC"), dec!(2000000));
        assert_eq!(intent.side(), Side::Buy);
        assert_eq!(intent.order_type(), OrderType::MarketByNotional);
        assert_eq!(intent.notional(), Some(dec!(2000000)));
        assert_eq!(intent.quantity(), None);
        assert_eq!(intent.limit_price(), None);
    }

    #[test]
    fn test_market_sell_carries_only_quantity() {
        let intent = OrderIntent::market_sell(Symbol::new("KRW-BTC"), dec!(0.5));
        assert_eq!(intent.side(), Side::Sell);
        assert_eq!(intent.order_type(), OrderType::MarketByQuantity);
        assert_eq!(intent.quantity(), Some(dec!(0.5)));
        assert_eq!(intent.notional(), None);
    }

    #[test]
    fn test_intent_wire_format() {
        let buy = OrderIntent::market_buy(Symbol::new("KRW-BTC"), dec!(2000000));
        let json = serde_json::to_value(&buy).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "market": "KRW-BTC",
                "side": "bid",
                "ord_type": "price",
                "price": "2000000"
            })
        );

        let sell = OrderIntent::market_sell(Symbol::new("KRW-BTC"), dec!(0.25));
        let json = serde_json::to_value(&sell).unwrap();
        assert_eq!(json["side"], "ask");
        assert_eq!(json["ord_type"], "market");
        assert_eq!(json["volume"], "0.25");
        assert!(json.get("price").is_none());
    }

    #[test]
    fn test_limit_order_carries_quantity_and_price() {
        let intent = OrderIntent::limit(Symbol::new("KRW-BTC"), Side::Sell, dec!(0.1), dec!(95000000));
        assert_eq!(intent.side(), Side::Sell);
        assert_eq!(intent.order_type(), OrderType::Limit);
        assert_eq!(intent.quantity(), Some(dec!(0.1)));
        assert_eq!(intent.limit_price(), Some(dec!(95000000)));
        assert_eq!(intent.notional(), None);

        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "market": "KRW-BTC",
                "side": "ask",
                "ord_type": "limit",
                "volume": "0.1",
                "price": "95000000"
            })
        );
    }

    #[test]
    fn test_symbol_serde_is_transparent() {
        let symbol = Symbol::new("KRW-ETH");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"KRW-ETH\"");
        let parsed: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, symbol);
    }
}
