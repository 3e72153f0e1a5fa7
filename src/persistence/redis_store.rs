use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::{timeout, Duration};

use super::MarketStore;
use crate::models::{Candle, Tick, TradeRecord};
use crate::Result;

const TRADES_KEY: &str = "trades";

/// Redis persistence for ticks, candles and trade records
///
/// Each stream is a sorted set scored by timestamp, trimmed by rank so only
/// the newest `retention` entries survive.
pub struct RedisStore {
    conn: ConnectionManager,
    tick_retention: usize,
    candle_retention: usize,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `tick_retention` - Ticks kept per symbol
    /// * `candle_retention` - Candles kept per symbol
    pub async fn new(redis_url: &str, tick_retention: usize, candle_retention: usize) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            tick_retention: tick_retention.max(1),
            candle_retention: candle_retention.max(1),
        })
    }

    async fn append<T: Serialize>(&mut self, key: &str, item: &T, score: f64, retention: Option<usize>) -> Result<()> {
        let value = serde_json::to_string(item)?;
        self.conn.zadd::<_, _, _, ()>(key, value, score).await?;

        if let Some(keep) = retention {
            let stop = -(keep as isize) - 1;
            let removed: usize = self.conn.zremrangebyrank(key, 0, stop).await?;
            if removed > 0 {
                tracing::debug!("Trimmed {} old entries from {}", removed, key);
            }
        }
        Ok(())
    }

    /// Newest `limit` entries, oldest first
    async fn tail<T: DeserializeOwned>(&mut self, key: &str, limit: usize) -> Result<Vec<T>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let start = -(limit as isize);
        let raw: Vec<String> = self.conn.zrange(key, start, -1).await?;
        decode_all(raw)
    }

    /// Remove every stream for `symbol`
    pub async fn clear_symbol(&mut self, symbol: &str) -> Result<()> {
        self.conn
            .del::<_, ()>(vec![tick_key(symbol), candle_key(symbol)])
            .await?;
        Ok(())
    }

    pub async fn count_ticks(&mut self, symbol: &str) -> Result<usize> {
        let count: usize = self.conn.zcard(tick_key(symbol)).await?;
        Ok(count)
    }
}

fn tick_key(symbol: &str) -> String {
    format!("ticks:{}", symbol)
}

fn candle_key(symbol: &str) -> String {
    format!("candles:{}", symbol)
}

fn decode_all<T: DeserializeOwned>(raw: Vec<String>) -> Result<Vec<T>> {
    raw.iter()
        .map(|json| serde_json::from_str(json).map_err(Into::into))
        .collect()
}

impl MarketStore for RedisStore {
    async fn save_tick(&mut self, tick: &Tick) -> Result<()> {
        let score = tick.timestamp.timestamp_millis() as f64;
        let retention = self.tick_retention;
        self.append(&tick_key(&tick.symbol), tick, score, Some(retention)).await
    }

    async fn save_candle(&mut self, candle: &Candle) -> Result<()> {
        let score = candle.period_start.timestamp() as f64;
        let retention = self.candle_retention;
        self.append(&candle_key(&candle.symbol), candle, score, Some(retention)).await
    }

    async fn save_trade(&mut self, record: &TradeRecord) -> Result<()> {
        let score = record.timestamp.timestamp_millis() as f64;
        self.append(TRADES_KEY, record, score, None).await?;
        tracing::debug!("Saved trade {} to Redis", record.id);
        Ok(())
    }

    async fn recent_ticks(&mut self, symbol: &str, limit: usize) -> Result<Vec<Tick>> {
        self.tail(&tick_key(symbol), limit).await
    }

    async fn recent_candles(&mut self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        self.tail(&candle_key(symbol), limit).await
    }

    async fn recent_trades(&mut self, limit: usize) -> Result<Vec<TradeRecord>> {
        self.tail(TRADES_KEY, limit).await
    }

    async fn all_trades(&mut self) -> Result<Vec<TradeRecord>> {
        let raw: Vec<String> = self.conn.zrange(TRADES_KEY, 0, -1).await?;
        decode_all(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn candle(symbol: &str, minute: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            period_start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + ChronoDuration::minutes(minute),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(tick_key("R_100"), "ticks:R_100");
        assert_eq!(candle_key("R_100"), "candles:R_100");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_connection_timeout() {
        // Try to connect to non-existent Redis
        let result = RedisStore::new("redis://192.0.2.1:6379", 10, 10).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_candle_retention() {
        let mut store = RedisStore::new("redis://127.0.0.1:6379", 10, 3)
            .await
            .expect("Failed to connect to Redis");
        store.clear_symbol("TEST_RETAIN").await.unwrap();

        for i in 0..5 {
            store
                .save_candle(&candle("TEST_RETAIN", i, 100.0 + i as f64))
                .await
                .unwrap();
        }

        let loaded = store.recent_candles("TEST_RETAIN", 10).await.unwrap();
        let closes: Vec<f64> = loaded.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![102.0, 103.0, 104.0]);

        // Cleanup
        store.clear_symbol("TEST_RETAIN").await.unwrap();
    }
}
