use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

use super::{classify, CandlePattern, DataError};
use crate::models::{Candle, Tick};

pub const MIN_CAPACITY: usize = 100;
pub const MAX_CAPACITY: usize = 1000;

/// The candle currently being built and the epoch second its period ends at
#[derive(Debug, Clone)]
struct OpenCandle {
    candle: Candle,
    end_secs: i64,
}

#[derive(Debug, Clone, Default)]
struct SymbolSeries {
    open: Option<OpenCandle>,
    sealed: VecDeque<Candle>,
    /// End of the period covered by the sealed history
    sealed_until: Option<i64>,
    last_tick_at: Option<DateTime<Utc>>,
}

/// Builds fixed-width OHLCV candles per symbol from a tick stream
///
/// Keeps one open candle per symbol plus a bounded history of sealed
/// candles (oldest evicted first).
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    timeframe_secs: i64,
    capacity: usize,
    series: HashMap<String, SymbolSeries>,
}

impl CandleAggregator {
    /// Create an aggregator
    ///
    /// # Arguments
    /// * `timeframe_secs` - Candle width in seconds (at least 1)
    /// * `capacity` - Sealed candles kept per symbol, clamped to 100..=1000
    pub fn new(timeframe_secs: u64, capacity: usize) -> Self {
        let clamped = capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        if clamped != capacity {
            tracing::warn!(
                "Candle capacity {} out of range, using {}",
                capacity,
                clamped
            );
        }

        Self {
            timeframe_secs: timeframe_secs.max(1) as i64,
            capacity: clamped,
            series: HashMap::new(),
        }
    }

    pub fn timeframe_secs(&self) -> u64 {
        self.timeframe_secs as u64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the candle width for candles opened from now on
    pub fn set_timeframe(&mut self, seconds: u64) {
        let seconds = seconds.max(1) as i64;
        if seconds != self.timeframe_secs {
            tracing::info!(
                "Candle timeframe changed {}s -> {}s",
                self.timeframe_secs,
                seconds
            );
            self.timeframe_secs = seconds;
        }
    }

    /// Feed one tick
    ///
    /// Returns the candle sealed by this tick, if its bucket differs from the
    /// open candle's. Invalid or out-of-order ticks leave state untouched.
    pub fn add_tick(&mut self, tick: &Tick) -> Result<Option<Candle>, DataError> {
        validate_tick(tick)?;

        let series = self.series.entry(tick.symbol.clone()).or_default();
        if let Some(last) = series.last_tick_at {
            if tick.timestamp < last {
                return Err(DataError::OutOfOrder {
                    symbol: tick.symbol.clone(),
                    timestamp: tick.timestamp,
                    last,
                });
            }
        }

        let epoch = tick.timestamp.timestamp();

        if let Some(open) = series.open.as_mut() {
            if epoch < open.end_secs {
                let candle = &mut open.candle;
                candle.high = candle.high.max(tick.price);
                candle.low = candle.low.min(tick.price);
                candle.close = tick.price;
                candle.volume += tick.volume;
                series.last_tick_at = Some(tick.timestamp);
                return Ok(None);
            }
        }

        // A new candle never starts inside a period that is already covered.
        // After a timeframe change the first candle runs from there to the
        // next boundary of the new timeframe.
        let floor = series.open.as_ref().map(|open| open.end_secs).or(series.sealed_until);
        if let Some(floor) = floor {
            if epoch < floor {
                tracing::debug!(
                    symbol = %tick.symbol,
                    "Tick at {} falls inside an already sealed candle, skipping",
                    tick.timestamp
                );
                series.last_tick_at = Some(tick.timestamp);
                return Ok(None);
            }
        }

        let aligned = bucket_start(epoch, self.timeframe_secs);
        let start = floor.map_or(aligned, |floor| aligned.max(floor));
        let period_start =
            DateTime::from_timestamp(start, 0).ok_or(DataError::InvalidTimestamp(start))?;

        let fresh = OpenCandle {
            candle: Candle {
                symbol: tick.symbol.clone(),
                period_start,
                open: tick.price,
                high: tick.price,
                low: tick.price,
                close: tick.price,
                volume: tick.volume,
            },
            end_secs: aligned + self.timeframe_secs,
        };

        let sealed = series.open.replace(fresh).map(|open| {
            series.sealed_until = Some(open.end_secs);
            open.candle
        });
        if let Some(candle) = &sealed {
            series.sealed.push_back(candle.clone());
            while series.sealed.len() > self.capacity {
                series.sealed.pop_front();
            }
            tracing::debug!(
                symbol = %candle.symbol,
                "Sealed candle {} O={:.4} H={:.4} L={:.4} C={:.4}",
                candle.period_start,
                candle.open,
                candle.high,
                candle.low,
                candle.close
            );
        }
        series.last_tick_at = Some(tick.timestamp);

        Ok(sealed)
    }

    /// Sealed candles for `symbol`, most recent last
    pub fn candles(&self, symbol: &str) -> Vec<Candle> {
        self.series
            .get(symbol)
            .map(|s| s.sealed.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The N most recent sealed candles
    pub fn recent_candles(&self, symbol: &str, n: usize) -> Vec<Candle> {
        self.series
            .get(symbol)
            .map(|s| s.sealed.iter().rev().take(n).rev().cloned().collect())
            .unwrap_or_default()
    }

    /// The candle still accumulating ticks
    pub fn current_candle(&self, symbol: &str) -> Option<&Candle> {
        self.series
            .get(symbol)
            .and_then(|s| s.open.as_ref())
            .map(|open| &open.candle)
    }

    pub fn candle_count(&self, symbol: &str) -> usize {
        self.series.get(symbol).map(|s| s.sealed.len()).unwrap_or(0)
    }

    /// Latest traded price for `symbol`
    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        let series = self.series.get(symbol)?;
        series
            .open
            .as_ref()
            .map(|open| open.candle.close)
            .or_else(|| series.sealed.back().map(|c| c.close))
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Pattern formed by the last three sealed candles
    pub fn detect_pattern(&self, symbol: &str) -> Option<CandlePattern> {
        let series = self.series.get(symbol)?;
        if series.sealed.len() < 3 {
            return None;
        }
        let recent: Vec<Candle> = series.sealed.iter().skip(series.sealed.len() - 3).cloned().collect();
        classify(&recent)
    }

    /// Preload sealed history (e.g. from persistence)
    ///
    /// Malformed candles are dropped with a warning; returns how many were kept.
    pub fn seed(&mut self, symbol: &str, candles: Vec<Candle>) -> usize {
        let series = self.series.entry(symbol.to_string()).or_default();
        let mut kept = 0;

        for candle in candles {
            if let Err(e) = validate_candle(&candle) {
                tracing::warn!("Dropping seeded candle: {}", e);
                continue;
            }
            if let Some(last) = series.sealed.back() {
                if candle.period_start <= last.period_start {
                    continue;
                }
            }
            series.last_tick_at = Some(candle.period_start);
            series.sealed_until = Some(candle.period_start.timestamp() + self.timeframe_secs);
            series.sealed.push_back(candle);
            kept += 1;
        }

        while series.sealed.len() > self.capacity {
            series.sealed.pop_front();
        }

        tracing::info!("Seeded {} candles for {}", kept, symbol);
        kept
    }

    /// Sealed candles of every symbol, keyed by symbol
    pub fn candle_map(&self) -> HashMap<String, Vec<Candle>> {
        self.series
            .iter()
            .map(|(symbol, s)| (symbol.clone(), s.sealed.iter().cloned().collect()))
            .collect()
    }
}

fn bucket_start(epoch_secs: i64, timeframe_secs: i64) -> i64 {
    epoch_secs.div_euclid(timeframe_secs) * timeframe_secs
}

fn validate_tick(tick: &Tick) -> Result<(), DataError> {
    if tick.symbol.is_empty() {
        return Err(DataError::EmptySymbol);
    }
    if !tick.price.is_finite() || tick.price <= 0.0 {
        return Err(DataError::InvalidPrice {
            symbol: tick.symbol.clone(),
            price: tick.price,
        });
    }
    if !tick.volume.is_finite() || tick.volume < 0.0 {
        return Err(DataError::InvalidVolume {
            symbol: tick.symbol.clone(),
            volume: tick.volume,
        });
    }
    Ok(())
}

fn validate_candle(candle: &Candle) -> Result<(), DataError> {
    let malformed = |reason: &str| DataError::MalformedCandle {
        symbol: candle.symbol.clone(),
        reason: reason.to_string(),
    };

    let prices = [candle.open, candle.high, candle.low, candle.close];
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(malformed("non-positive price"));
    }
    if candle.high < candle.low
        || candle.high < candle.open.max(candle.close)
        || candle.low > candle.open.min(candle.close)
    {
        return Err(malformed("high/low do not bound open/close"));
    }
    if !candle.volume.is_finite() || candle.volume < 0.0 {
        return Err(malformed("negative volume"));
    }
    Ok(())
}

/// Merge consecutive groups of `factor` candles into wider candles
///
/// A trailing partial group is dropped.
pub fn resample(candles: &[Candle], factor: usize) -> Vec<Candle> {
    if factor <= 1 {
        return candles.to_vec();
    }

    candles
        .chunks_exact(factor)
        .map(|group| {
            let first = &group[0];
            let last = &group[group.len() - 1];
            Candle {
                symbol: first.symbol.clone(),
                period_start: first.period_start,
                open: first.open,
                high: group.iter().map(|c| c.high).fold(f64::MIN, f64::max),
                low: group.iter().map(|c| c.low).fold(f64::MAX, f64::min),
                close: last.close,
                volume: group.iter().map(|c| c.volume).sum(),
            }
        })
        .collect()
}
