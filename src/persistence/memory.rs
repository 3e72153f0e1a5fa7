use std::collections::{HashMap, VecDeque};

use super::{MarketStore, DEFAULT_CANDLE_RETENTION, DEFAULT_TICK_RETENTION};
use crate::models::{Candle, Tick, TradeRecord};
use crate::Result;

/// Process-local store; the default backend and the one tests use
#[derive(Debug, Clone)]
pub struct MemoryStore {
    ticks: HashMap<String, VecDeque<Tick>>,
    candles: HashMap<String, VecDeque<Candle>>,
    trades: Vec<TradeRecord>,
    tick_retention: usize,
    candle_retention: usize,
}

impl MemoryStore {
    pub fn new(tick_retention: usize, candle_retention: usize) -> Self {
        Self {
            ticks: HashMap::new(),
            candles: HashMap::new(),
            trades: Vec::new(),
            tick_retention: tick_retention.max(1),
            candle_retention: candle_retention.max(1),
        }
    }

    /// Pre-load trades, e.g. to replay a previous session
    pub fn with_trades(mut self, trades: Vec<TradeRecord>) -> Self {
        self.trades = trades;
        self
    }

    pub fn tick_count(&self, symbol: &str) -> usize {
        self.ticks.get(symbol).map(VecDeque::len).unwrap_or(0)
    }

    pub fn candle_count(&self, symbol: &str) -> usize {
        self.candles.get(symbol).map(VecDeque::len).unwrap_or(0)
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RETENTION, DEFAULT_CANDLE_RETENTION)
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, retention: usize) {
    queue.push_back(item);
    while queue.len() > retention {
        queue.pop_front();
    }
}

fn tail<T: Clone>(queue: Option<&VecDeque<T>>, limit: usize) -> Vec<T> {
    match queue {
        Some(q) => q.iter().skip(q.len().saturating_sub(limit)).cloned().collect(),
        None => Vec::new(),
    }
}

impl MarketStore for MemoryStore {
    async fn save_tick(&mut self, tick: &Tick) -> Result<()> {
        let retention = self.tick_retention;
        let queue = self.ticks.entry(tick.symbol.clone()).or_default();
        push_bounded(queue, tick.clone(), retention);
        Ok(())
    }

    async fn save_candle(&mut self, candle: &Candle) -> Result<()> {
        let retention = self.candle_retention;
        let queue = self.candles.entry(candle.symbol.clone()).or_default();
        push_bounded(queue, candle.clone(), retention);
        Ok(())
    }

    async fn save_trade(&mut self, record: &TradeRecord) -> Result<()> {
        self.trades.push(record.clone());
        Ok(())
    }

    async fn recent_ticks(&mut self, symbol: &str, limit: usize) -> Result<Vec<Tick>> {
        Ok(tail(self.ticks.get(symbol), limit))
    }

    async fn recent_candles(&mut self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        Ok(tail(self.candles.get(symbol), limit))
    }

    async fn recent_trades(&mut self, limit: usize) -> Result<Vec<TradeRecord>> {
        let skip = self.trades.len().saturating_sub(limit);
        Ok(self.trades[skip..].to_vec())
    }

    async fn all_trades(&mut self) -> Result<Vec<TradeRecord>> {
        Ok(self.trades.clone())
    }
}
