use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::indicators::IndicatorSnapshot;
use crate::market::CandlePattern;
use crate::strategy::StrategyKind;

/// A single price update from the venue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, volume: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume,
            timestamp,
        }
    }
}

/// OHLCV candlestick aggregated over one timeframe bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub period_start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Contract direction on a binary option
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "PUT")]
    Put,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Call => Direction::Put,
            Direction::Put => Direction::Call,
        }
    }

    /// +1 for CALL, -1 for PUT
    pub fn sign(self) -> f64 {
        match self {
            Direction::Call => 1.0,
            Direction::Put => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Call => "CALL",
            Direction::Put => "PUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading recommendation for one evaluation cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub should_trade: bool,
    pub direction: Direction,
    pub confidence: f64,
    pub reason: String,
}

impl Signal {
    pub fn trade(direction: Direction, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            should_trade: true,
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    pub fn no_trade(reason: impl Into<String>) -> Self {
        Self {
            should_trade: false,
            direction: Direction::default(),
            confidence: 0.0,
            reason: reason.into(),
        }
    }

    /// Turn a trade recommendation into a suppressed one, keeping the direction for logs
    pub fn suppress(self, why: &str) -> Self {
        Self {
            should_trade: false,
            confidence: 0.0,
            reason: format!("{} (suppressed: {})", self.reason, why),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeResult {
    Win,
    Loss,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Trend {
    Up,
    Down,
    #[default]
    Sideways,
}

/// Market context captured alongside the indicators when a decision is made
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MarketConditions {
    pub trend: Trend,
    pub volatility: f64,
    pub adx: f64,
    pub in_blackout: bool,
    pub pattern: Option<CandlePattern>,
    pub hour: u32,
    /// Latest price of every tracked symbol
    pub peer_prices: BTreeMap<String, f64>,
}

/// The single open position held by a controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveContract {
    pub id: String,
    pub symbol: String,
    pub stake: f64,
    pub direction: Direction,
    pub buy_price: f64,
    pub start_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub strategy: StrategyKind,
    pub entry_indicators: IndicatorSnapshot,
    pub entry_conditions: MarketConditions,
}

/// Immutable record of a settled trade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub id: Uuid,
    pub contract_id: String,
    pub symbol: String,
    pub strategy: StrategyKind,
    pub result: TradeResult,
    pub pnl: f64,
    pub stake: f64,
    pub direction: Direction,
    pub duration_secs: u64,
    pub indicators_at_entry: IndicatorSnapshot,
    pub market_conditions_at_entry: MarketConditions,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    /// Build the record for a contract that settled with the given sell price
    pub fn from_contract(contract: &ActiveContract, sell_price: f64, settled_at: DateTime<Utc>) -> Self {
        let pnl = sell_price - contract.buy_price;
        Self {
            id: Uuid::new_v4(),
            contract_id: contract.id.clone(),
            symbol: contract.symbol.clone(),
            strategy: contract.strategy,
            result: if pnl > 0.0 {
                TradeResult::Win
            } else {
                TradeResult::Loss
            },
            pnl,
            stake: contract.stake,
            direction: contract.direction,
            duration_secs: contract.duration_secs,
            indicators_at_entry: contract.entry_indicators.clone(),
            market_conditions_at_entry: contract.entry_conditions.clone(),
            timestamp: settled_at,
        }
    }

    pub fn is_win(&self) -> bool {
        self.result == TradeResult::Win
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contract() -> ActiveContract {
        ActiveContract {
            id: "1234".to_string(),
            symbol: "R_100".to_string(),
            stake: 1.0,
            direction: Direction::Call,
            buy_price: 1.0,
            start_time: Utc::now(),
            duration_secs: 60,
            strategy: StrategyKind::RsiThreshold,
            entry_indicators: IndicatorSnapshot::default(),
            entry_conditions: MarketConditions::default(),
        }
    }

    #[test]
    fn test_candle_geometry() {
        let candle = Candle {
            symbol: "R_100".to_string(),
            period_start: Utc::now(),
            open: 100.0,
            high: 106.0,
            low: 97.0,
            close: 104.0,
            volume: 3.0,
        };

        assert_eq!(candle.body(), 4.0);
        assert_eq!(candle.range(), 9.0);
        assert_eq!(candle.upper_wick(), 2.0);
        assert_eq!(candle.lower_wick(), 3.0);
        assert!(candle.is_bullish());
    }

    #[test]
    fn test_direction_serializes_as_venue_contract_type() {
        assert_eq!(serde_json::to_string(&Direction::Call).unwrap(), "\"CALL\"");
        assert_eq!(serde_json::to_string(&Direction::Put).unwrap(), "\"PUT\"");
        assert_eq!(Direction::Call.opposite(), Direction::Put);
    }

    #[test]
    fn test_signal_confidence_is_clamped() {
        let signal = Signal::trade(Direction::Put, 1.7, "test");
        assert_eq!(signal.confidence, 1.0);

        let suppressed = signal.suppress("no pattern");
        assert!(!suppressed.should_trade);
        assert!(suppressed.reason.contains("no pattern"));
    }

    #[test]
    fn test_trade_record_from_contract() {
        let contract = sample_contract();

        let win = TradeRecord::from_contract(&contract, 1.95, Utc::now());
        assert_eq!(win.result, TradeResult::Win);
        assert!((win.pnl - 0.95).abs() < 1e-12);

        let loss = TradeRecord::from_contract(&contract, 0.0, Utc::now());
        assert_eq!(loss.result, TradeResult::Loss);
        assert_eq!(loss.pnl, -1.0);
    }

    #[test]
    fn test_trade_record_round_trip() {
        let contract = ActiveContract {
            entry_indicators: IndicatorSnapshot {
                rsi: 63.127_456_789,
                moving_average: 101.25,
                volatility: 0.8123,
                candle_count: 40,
                ..IndicatorSnapshot::default()
            },
            entry_conditions: MarketConditions {
                trend: Trend::Up,
                volatility: 0.8123,
                pattern: Some(CandlePattern::Hammer),
                peer_prices: [("R_50".to_string(), 250.5)].into_iter().collect(),
                ..MarketConditions::default()
            },
            ..sample_contract()
        };
        let record = TradeRecord::from_contract(&contract, 1.87, Utc::now());

        let json = serde_json::to_string(&record).unwrap();
        let restored: TradeRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, record);
    }
}
