use crate::models::{Direction, TradeRecord, TradeResult};
use crate::strategy::StrategyKind;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use uuid::Uuid;

/// Postgres persistence for settled trades
pub struct PostgresTradeStore {
    pool: PgPool,
}

impl PostgresTradeStore {
    /// Connect to Postgres and apply pending migrations
    ///
    /// # Arguments
    /// * `database_url` - Postgres connection URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres at {}", database_url);

        Ok(Self { pool })
    }

    /// Save a settled trade; re-saving the same id is a no-op
    pub async fn save_trade(&self, record: &TradeRecord) -> Result<()> {
        let indicators = serde_json::to_string(&record.indicators_at_entry)?;
        let conditions = serde_json::to_string(&record.market_conditions_at_entry)?;

        sqlx::query(
            r#"
            INSERT INTO trade_records (
                id, contract_id, symbol, strategy, result, pnl, stake,
                direction, duration_secs, indicators, market_conditions, settled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.contract_id)
        .bind(&record.symbol)
        .bind(record.strategy.as_str())
        .bind(result_str(record.result))
        .bind(record.pnl)
        .bind(record.stake)
        .bind(record.direction.as_str())
        .bind(record.duration_secs as i64)
        .bind(indicators)
        .bind(conditions)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Saved trade {} to Postgres", record.id);
        Ok(())
    }

    /// Every stored trade, oldest first
    pub async fn load_trades(&self) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, contract_id, symbol, strategy, result, pnl, stake,
                   direction, duration_secs, indicators, market_conditions, settled_at
            FROM trade_records
            ORDER BY settled_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let trades = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        tracing::info!("Loaded {} trades from Postgres", trades.len());
        Ok(trades)
    }

    /// The newest `limit` trades, oldest first
    pub async fn load_recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, contract_id, symbol, strategy, result, pnl, stake,
                   direction, duration_secs, indicators, market_conditions, settled_at
            FROM trade_records
            ORDER BY settled_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut trades = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        trades.reverse();
        Ok(trades)
    }

    /// Delete all trades (testing only)
    #[cfg(test)]
    pub async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM trade_records")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn result_str(result: TradeResult) -> &'static str {
    match result {
        TradeResult::Win => "Win",
        TradeResult::Loss => "Loss",
    }
}

fn parse_result(s: &str) -> Result<TradeResult> {
    match s {
        "Win" => Ok(TradeResult::Win),
        "Loss" => Ok(TradeResult::Loss),
        _ => Err(format!("Invalid trade result: {}", s).into()),
    }
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "CALL" => Ok(Direction::Call),
        "PUT" => Ok(Direction::Put),
        _ => Err(format!("Invalid direction: {}", s).into()),
    }
}

fn row_to_record(row: &PgRow) -> Result<TradeRecord> {
    let strategy: String = row.try_get("strategy")?;
    let result: String = row.try_get("result")?;
    let direction: String = row.try_get("direction")?;
    let duration_secs: i64 = row.try_get("duration_secs")?;
    let indicators: String = row.try_get("indicators")?;
    let conditions: String = row.try_get("market_conditions")?;
    let id: Uuid = row.try_get("id")?;
    let settled_at: DateTime<Utc> = row.try_get("settled_at")?;

    Ok(TradeRecord {
        id,
        contract_id: row.try_get("contract_id")?,
        symbol: row.try_get("symbol")?,
        strategy: strategy.parse::<StrategyKind>()?,
        result: parse_result(&result)?,
        pnl: row.try_get("pnl")?,
        stake: row.try_get("stake")?,
        direction: parse_direction(&direction)?,
        duration_secs: duration_secs.max(0) as u64,
        indicators_at_entry: serde_json::from_str(&indicators)?,
        market_conditions_at_entry: serde_json::from_str(&conditions)?,
        timestamp: settled_at,
    })
}
