use serde::{Deserialize, Serialize};

use crate::models::{Candle, Direction};

/// Body no larger than this share of the range is a doji
pub const DOJI_BODY_RATIO: f64 = 0.1;
/// Short-wick / body and body / long-wick ratio for hammers and shooting stars
pub const WICK_RATIO: f64 = 0.3;
/// Middle star body no larger than this share of the first candle's body
pub const STAR_BODY_RATIO: f64 = 0.3;

/// Reversal and continuation patterns recognised on sealed candles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CandlePattern {
    BullishEngulfing,
    BearishEngulfing,
    Doji,
    Hammer,
    ShootingStar,
    MorningStar,
    EveningStar,
    BullishHarami,
    BearishHarami,
}

impl CandlePattern {
    pub fn is_bullish(self) -> bool {
        matches!(
            self,
            CandlePattern::BullishEngulfing
                | CandlePattern::Hammer
                | CandlePattern::MorningStar
                | CandlePattern::BullishHarami
        )
    }

    pub fn is_bearish(self) -> bool {
        matches!(
            self,
            CandlePattern::BearishEngulfing
                | CandlePattern::ShootingStar
                | CandlePattern::EveningStar
                | CandlePattern::BearishHarami
        )
    }

    /// Whether this pattern supports a trade in `direction` (doji supports both)
    pub fn confirms(self, direction: Direction) -> bool {
        match self {
            CandlePattern::Doji => true,
            _ => match direction {
                Direction::Call => self.is_bullish(),
                Direction::Put => self.is_bearish(),
            },
        }
    }
}

/// Classify the most recent candles of `candles` (oldest first)
///
/// Three-candle stars win over two-candle patterns, which win over
/// single-candle shapes. Needs at least two candles.
pub fn classify(candles: &[Candle]) -> Option<CandlePattern> {
    if candles.len() < 2 {
        return None;
    }

    let n = candles.len();
    let current = &candles[n - 1];
    let previous = &candles[n - 2];

    if n >= 3 {
        if let Some(star) = star(&candles[n - 3], previous, current) {
            return Some(star);
        }
    }

    engulfing(previous, current)
        .or_else(|| harami(previous, current))
        .or_else(|| single(current))
}

fn star(first: &Candle, middle: &Candle, last: &Candle) -> Option<CandlePattern> {
    let first_body = first.body();
    if first_body <= 0.0 || middle.body() > first_body * STAR_BODY_RATIO {
        return None;
    }

    let midpoint = (first.open + first.close) / 2.0;
    if first.is_bearish() && last.is_bullish() && last.close > midpoint {
        Some(CandlePattern::MorningStar)
    } else if first.is_bullish() && last.is_bearish() && last.close < midpoint {
        Some(CandlePattern::EveningStar)
    } else {
        None
    }
}

fn engulfing(previous: &Candle, current: &Candle) -> Option<CandlePattern> {
    if current.body() <= previous.body() {
        return None;
    }

    if previous.is_bearish()
        && current.is_bullish()
        && current.open <= previous.close
        && current.close >= previous.open
    {
        Some(CandlePattern::BullishEngulfing)
    } else if previous.is_bullish()
        && current.is_bearish()
        && current.open >= previous.close
        && current.close <= previous.open
    {
        Some(CandlePattern::BearishEngulfing)
    } else {
        None
    }
}

fn harami(previous: &Candle, current: &Candle) -> Option<CandlePattern> {
    if current.body() <= 0.0 || current.body() >= previous.body() {
        return None;
    }

    if previous.is_bearish()
        && current.is_bullish()
        && current.open >= previous.close
        && current.close <= previous.open
    {
        Some(CandlePattern::BullishHarami)
    } else if previous.is_bullish()
        && current.is_bearish()
        && current.open <= previous.close
        && current.close >= previous.open
    {
        Some(CandlePattern::BearishHarami)
    } else {
        None
    }
}

fn single(candle: &Candle) -> Option<CandlePattern> {
    let range = candle.range();
    if range <= 0.0 {
        return None;
    }

    let body = candle.body();
    if body <= DOJI_BODY_RATIO * range {
        return Some(CandlePattern::Doji);
    }

    if candle.upper_wick() <= WICK_RATIO * body && body <= WICK_RATIO * candle.lower_wick() {
        Some(CandlePattern::Hammer)
    } else if candle.lower_wick() <= WICK_RATIO * body && body <= WICK_RATIO * candle.upper_wick() {
        Some(CandlePattern::ShootingStar)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "R_100".to_string(),
            period_start: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_bullish_engulfing() {
        let candles = vec![candle(101.0, 101.2, 99.8, 100.0), candle(99.5, 102.0, 99.4, 101.5)];
        assert_eq!(classify(&candles), Some(CandlePattern::BullishEngulfing));
    }

    #[test]
    fn test_bearish_engulfing() {
        let candles = vec![candle(100.0, 101.2, 99.8, 101.0), candle(101.5, 101.6, 99.0, 99.5)];
        assert_eq!(classify(&candles), Some(CandlePattern::BearishEngulfing));
    }

    #[test]
    fn test_equal_bodies_do_not_engulf() {
        let candles = vec![candle(101.0, 101.5, 99.5, 100.0), candle(100.0, 101.5, 99.5, 101.0)];
        assert_ne!(classify(&candles), Some(CandlePattern::BullishEngulfing));
    }

    #[test]
    fn test_doji() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.5), candle(100.0, 101.0, 99.0, 100.05)];
        assert_eq!(classify(&candles), Some(CandlePattern::Doji));
    }

    #[test]
    fn test_hammer_and_shooting_star() {
        // body 0.3, upper wick 0.05, lower wick 1.2
        let hammer = vec![candle(100.0, 100.5, 99.5, 100.2), candle(100.0, 100.35, 98.8, 100.3)];
        assert_eq!(classify(&hammer), Some(CandlePattern::Hammer));

        // body 0.3, upper wick 1.2, lower wick 0.05
        let star = vec![candle(100.2, 100.5, 99.5, 100.0), candle(100.3, 101.5, 99.95, 100.0)];
        assert_eq!(classify(&star), Some(CandlePattern::ShootingStar));
    }

    #[test]
    fn test_morning_and_evening_star() {
        let morning = vec![
            candle(105.0, 105.2, 99.8, 100.0),
            candle(99.8, 100.3, 99.0, 99.6),
            candle(99.7, 104.0, 99.5, 103.5),
        ];
        assert_eq!(classify(&morning), Some(CandlePattern::MorningStar));

        let evening = vec![
            candle(100.0, 105.2, 99.8, 105.0),
            candle(105.2, 106.0, 105.0, 105.4),
            candle(105.3, 105.5, 101.0, 101.5),
        ];
        assert_eq!(classify(&evening), Some(CandlePattern::EveningStar));
    }

    #[test]
    fn test_harami() {
        let bullish = vec![candle(105.0, 105.5, 99.5, 100.0), candle(101.0, 103.5, 100.8, 103.0)];
        assert_eq!(classify(&bullish), Some(CandlePattern::BullishHarami));

        let bearish = vec![candle(100.0, 105.5, 99.5, 105.0), candle(104.0, 104.2, 101.5, 102.0)];
        assert_eq!(classify(&bearish), Some(CandlePattern::BearishHarami));
    }

    #[test]
    fn test_flat_candles_have_no_pattern() {
        let flat = vec![candle(100.0, 100.0, 100.0, 100.0); 3];
        assert_eq!(classify(&flat), None);
        assert_eq!(classify(&flat[..1]), None);
    }

    #[test]
    fn test_confirmation_rules() {
        assert!(CandlePattern::Doji.confirms(Direction::Call));
        assert!(CandlePattern::Doji.confirms(Direction::Put));
        assert!(CandlePattern::Hammer.confirms(Direction::Call));
        assert!(!CandlePattern::Hammer.confirms(Direction::Put));
        assert!(CandlePattern::EveningStar.confirms(Direction::Put));
        assert!(!CandlePattern::BullishHarami.confirms(Direction::Put));
    }
}
