use std::collections::{BTreeMap, VecDeque};

use crate::models::TradeRecord;
use crate::strategy::StrategyKind;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Win/loss statistics over a set of trade records
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    /// Mean PnL of winning trades
    pub avg_win: f64,
    /// Mean absolute PnL of losing trades
    pub avg_loss: f64,
    pub total_pnl: f64,
}

impl TradeStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TradeRecord>) -> Self {
        let mut stats = TradeStats::default();
        let mut win_sum = 0.0;
        let mut loss_sum = 0.0;

        for record in records {
            stats.trades += 1;
            stats.total_pnl += record.pnl;
            if record.is_win() {
                stats.wins += 1;
                win_sum += record.pnl;
            } else {
                stats.losses += 1;
                loss_sum += record.pnl.abs();
            }
        }

        if stats.trades > 0 {
            stats.win_rate = stats.wins as f64 / stats.trades as f64;
        }
        if stats.wins > 0 {
            stats.avg_win = win_sum / stats.wins as f64;
        }
        if stats.losses > 0 {
            stats.avg_loss = loss_sum / stats.losses as f64;
        }

        stats
    }
}

/// Bounded in-memory trade history (most recent last)
#[derive(Debug, Clone)]
pub struct TradeHistory {
    records: VecDeque<TradeRecord>,
    capacity: usize,
}

impl Default for TradeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TradeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Build from persisted records, keeping only the newest `capacity`
    pub fn with_records(capacity: usize, records: Vec<TradeRecord>) -> Self {
        let mut history = Self::new(capacity);
        for record in records {
            history.push(record);
        }
        history
    }

    pub fn push(&mut self, record: TradeRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &TradeRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<TradeRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&TradeRecord> {
        self.records.back()
    }

    pub fn stats(&self) -> TradeStats {
        TradeStats::from_records(self.records.iter())
    }

    pub fn stats_for(&self, strategy: StrategyKind) -> TradeStats {
        TradeStats::from_records(self.records.iter().filter(|r| r.strategy == strategy))
    }

    /// Stats for every strategy that has at least one record
    pub fn per_strategy(&self) -> BTreeMap<StrategyKind, TradeStats> {
        let mut grouped: BTreeMap<StrategyKind, Vec<&TradeRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.strategy).or_default().push(record);
        }
        grouped
            .into_iter()
            .map(|(kind, records)| (kind, TradeStats::from_records(records)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::indicators::IndicatorSnapshot;
    use crate::models::{Direction, MarketConditions, TradeResult};
    use chrono::Utc;
    use uuid::Uuid;

    pub fn record(strategy: StrategyKind, pnl: f64) -> TradeRecord {
        TradeRecord {
            id: Uuid::new_v4(),
            contract_id: "c".to_string(),
            symbol: "R_100".to_string(),
            strategy,
            result: if pnl > 0.0 {
                TradeResult::Win
            } else {
                TradeResult::Loss
            },
            pnl,
            stake: 1.0,
            direction: Direction::Call,
            duration_secs: 60,
            indicators_at_entry: IndicatorSnapshot::default(),
            market_conditions_at_entry: MarketConditions::default(),
            timestamp: Utc::now(),
        }
    }
}
