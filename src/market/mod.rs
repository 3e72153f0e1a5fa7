// Market data module
// Tick aggregation into candles and candlestick pattern detection

pub mod aggregator;
pub mod patterns;

pub use aggregator::{resample, CandleAggregator, MAX_CAPACITY, MIN_CAPACITY};
pub use patterns::{classify, CandlePattern};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Market data rejected before it reaches the aggregator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("tick has an empty symbol")]
    EmptySymbol,

    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("invalid volume {volume} for {symbol}")]
    InvalidVolume { symbol: String, volume: f64 },

    #[error("out-of-order tick for {symbol}: {timestamp} is before {last}")]
    OutOfOrder {
        symbol: String,
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("timestamp {0} cannot be bucketed")]
    InvalidTimestamp(i64),

    #[error("malformed candle for {symbol}: {reason}")]
    MalformedCandle { symbol: String, reason: String },
}
