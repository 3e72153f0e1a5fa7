use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady upward drift with small noise
    Uptrend,
    /// Steady downward drift with small noise
    Downtrend,
    /// Mean-reverting chop around the starting price
    Ranging,
    /// Large random swings
    Volatile,
    /// Decline for the first half, recovery for the second
    Reversal,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Ranging,
        MarketScenario::Volatile,
        MarketScenario::Reversal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Ranging => "ranging",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Reversal => "reversal",
        }
    }
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| format!("unknown scenario '{}'", s))
    }
}

/// Seeded random-walk candle generator for offline replays
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    start: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 1000.0,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }

    pub fn with_base_price(mut self, price: f64) -> Self {
        self.base_price = price.max(1.0);
        self
    }

    /// Generate `num_candles` contiguous candles of `timeframe_secs` each
    ///
    /// Each candle opens at the previous close, so the series has no gaps.
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        symbol: &str,
        num_candles: usize,
        timeframe_secs: u64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;
        let half = num_candles / 2;

        for i in 0..num_candles {
            let open = price;
            let change = match scenario {
                MarketScenario::Uptrend => price * (0.0008 + self.rng.gen_range(-0.001..0.001)),
                MarketScenario::Downtrend => price * (-0.0008 + self.rng.gen_range(-0.001..0.001)),
                MarketScenario::Ranging => {
                    // 10% pull back to the starting price
                    (self.base_price - price) * 0.1 + price * self.rng.gen_range(-0.003..0.003)
                }
                MarketScenario::Volatile => price * self.rng.gen_range(-0.02..0.02),
                MarketScenario::Reversal => {
                    let drift = if i < half { -0.0015 } else { 0.0015 };
                    price * (drift + self.rng.gen_range(-0.001..0.001))
                }
            };

            price = (price + change).max(self.base_price * 0.1);

            let period_start = self.start + Duration::seconds((i as u64 * timeframe_secs) as i64);
            candles.push(self.create_candle(symbol, period_start, open, price));
        }

        candles
    }

    /// Helper to create a candle with wicks around the body
    fn create_candle(&mut self, symbol: &str, period_start: DateTime<Utc>, open: f64, close: f64) -> Candle {
        let wick_pct = 0.001;
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..wick_pct));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..wick_pct));

        Candle {
            symbol: symbol.to_string(),
            period_start,
            open,
            high,
            low,
            close,
            volume: self.rng.gen_range(20.0..60.0_f64).round(),
        }
    }
}
