use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for TradeDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(TradeDirection::Buy),
            "sell" | "short" => Ok(TradeDirection::Sell),
            _ => anyhow::bail!("Invalid trade direction: {}. Must be 'buy' or 'sell'", s),
        }
    }
}

/// A closed trade as recorded by the host strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTrade {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub direction: TradeDirection,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub volume: Decimal,
    pub profit: Decimal,
    pub profit_percent: Decimal,
    pub is_profitable: bool,
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalCandle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Snapshot of all historical records available to the fitness evaluator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalDataSet {
    pub trades: Vec<HistoricalTrade>,
    pub candles: Vec<HistoricalCandle>,
}

impl HistoricalDataSet {
    pub fn new(trades: Vec<HistoricalTrade>, candles: Vec<HistoricalCandle>) -> Self {
        Self { trades, candles }
    }

    /// True when neither trades nor candles were loaded
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.candles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing() {
        assert_eq!("Buy".parse::<TradeDirection>().unwrap(), TradeDirection::Buy);
        assert_eq!(" short ".parse::<TradeDirection>().unwrap(), TradeDirection::Sell);
        assert!("hold".parse::<TradeDirection>().is_err());
    }

    #[test]
    fn test_empty_data_set() {
        assert!(HistoricalDataSet::default().is_empty());
    }
}
