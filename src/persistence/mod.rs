// Persistence: tick, candle and trade-record streams
pub mod memory;
pub mod redis_store;

use std::future::Future;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::config::StorageConfig;
use crate::db::PostgresTradeStore;
use crate::models::{Candle, Tick, TradeRecord};
use crate::Result;

/// Ticks kept per symbol when no retention is configured
pub const DEFAULT_TICK_RETENTION: usize = 10_000;
/// Candles kept per symbol when no retention is configured
pub const DEFAULT_CANDLE_RETENTION: usize = 1_000;

/// Append/read access to the ticks, candles and trades streams
///
/// Ticks and candles are bounded per symbol (oldest evicted). Trades are the
/// long-term record: `recent_trades` is the short-term view, `all_trades`
/// everything ever written. Reads return oldest first.
pub trait MarketStore {
    fn save_tick(&mut self, tick: &Tick) -> impl Future<Output = Result<()>> + Send;

    fn save_candle(&mut self, candle: &Candle) -> impl Future<Output = Result<()>> + Send;

    fn save_trade(&mut self, record: &TradeRecord) -> impl Future<Output = Result<()>> + Send;

    fn recent_ticks(&mut self, symbol: &str, limit: usize) -> impl Future<Output = Result<Vec<Tick>>> + Send;

    fn recent_candles(&mut self, symbol: &str, limit: usize) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    fn recent_trades(&mut self, limit: usize) -> impl Future<Output = Result<Vec<TradeRecord>>> + Send;

    fn all_trades(&mut self) -> impl Future<Output = Result<Vec<TradeRecord>>> + Send;
}

/// Market data backend
pub enum MarketBackend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

/// Configured storage: market data in Redis (or memory), trades optionally in Postgres
pub struct Storage {
    market: MarketBackend,
    trades: Option<PostgresTradeStore>,
}

impl Storage {
    pub fn new(market: MarketBackend, trades: Option<PostgresTradeStore>) -> Self {
        Self { market, trades }
    }

    pub fn in_memory() -> Self {
        Self::new(MarketBackend::Memory(MemoryStore::default()), None)
    }

    /// Connect the configured backends, falling back to memory on failure
    pub async fn connect(config: &StorageConfig) -> Self {
        let tick_retention = retention(config.tick_retention, DEFAULT_TICK_RETENTION);
        let candle_retention = retention(config.candle_retention, DEFAULT_CANDLE_RETENTION);

        let market = match &config.redis_url {
            Some(url) => match RedisStore::new(url, tick_retention, candle_retention).await {
                Ok(store) => MarketBackend::Redis(store),
                Err(e) => {
                    tracing::warn!("⚠️  Redis unavailable ({}), using in-memory storage", e);
                    MarketBackend::Memory(MemoryStore::new(tick_retention, candle_retention))
                }
            },
            None => MarketBackend::Memory(MemoryStore::new(tick_retention, candle_retention)),
        };

        let trades = match &config.database_url {
            Some(url) => match PostgresTradeStore::new(url).await {
                Ok(store) => Some(store),
                Err(e) => {
                    tracing::warn!("⚠️  Postgres unavailable ({}), trades stay with market data", e);
                    None
                }
            },
            None => None,
        };

        Self { market, trades }
    }

    pub fn market(&self) -> &MarketBackend {
        &self.market
    }
}

fn retention(configured: usize, default: usize) -> usize {
    if configured == 0 {
        default
    } else {
        configured
    }
}

impl MarketStore for Storage {
    async fn save_tick(&mut self, tick: &Tick) -> Result<()> {
        match &mut self.market {
            MarketBackend::Memory(store) => store.save_tick(tick).await,
            MarketBackend::Redis(store) => store.save_tick(tick).await,
        }
    }

    async fn save_candle(&mut self, candle: &Candle) -> Result<()> {
        match &mut self.market {
            MarketBackend::Memory(store) => store.save_candle(candle).await,
            MarketBackend::Redis(store) => store.save_candle(candle).await,
        }
    }

    async fn save_trade(&mut self, record: &TradeRecord) -> Result<()> {
        if let Some(db) = &self.trades {
            return db.save_trade(record).await;
        }
        match &mut self.market {
            MarketBackend::Memory(store) => store.save_trade(record).await,
            MarketBackend::Redis(store) => store.save_trade(record).await,
        }
    }

    async fn recent_ticks(&mut self, symbol: &str, limit: usize) -> Result<Vec<Tick>> {
        match &mut self.market {
            MarketBackend::Memory(store) => store.recent_ticks(symbol, limit).await,
            MarketBackend::Redis(store) => store.recent_ticks(symbol, limit).await,
        }
    }

    async fn recent_candles(&mut self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        match &mut self.market {
            MarketBackend::Memory(store) => store.recent_candles(symbol, limit).await,
            MarketBackend::Redis(store) => store.recent_candles(symbol, limit).await,
        }
    }

    async fn recent_trades(&mut self, limit: usize) -> Result<Vec<TradeRecord>> {
        if let Some(db) = &self.trades {
            return db.load_recent_trades(limit).await;
        }
        match &mut self.market {
            MarketBackend::Memory(store) => store.recent_trades(limit).await,
            MarketBackend::Redis(store) => store.recent_trades(limit).await,
        }
    }

    async fn all_trades(&mut self) -> Result<Vec<TradeRecord>> {
        if let Some(db) = &self.trades {
            return db.load_trades().await;
        }
        match &mut self.market {
            MarketBackend::Memory(store) => store.all_trades().await,
            MarketBackend::Redis(store) => store.all_trades().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::history::test_support::record;
    use crate::strategy::StrategyKind;

    #[tokio::test]
    async fn test_storage_without_backends_uses_memory() {
        let mut storage = Storage::connect(&StorageConfig::default()).await;
        assert!(matches!(storage.market(), MarketBackend::Memory(_)));

        let trade = record(StrategyKind::Grid, 0.9);
        storage.save_trade(&trade).await.unwrap();
        assert_eq!(storage.all_trades().await.unwrap(), vec![trade]);
    }

    #[test]
    fn test_zero_retention_means_default() {
        assert_eq!(retention(0, DEFAULT_TICK_RETENTION), DEFAULT_TICK_RETENTION);
        assert_eq!(retention(50, DEFAULT_TICK_RETENTION), 50);
    }
}
