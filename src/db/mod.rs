// Relational storage for the trade ledger
pub mod postgres;

pub use postgres::PostgresTradeStore;
