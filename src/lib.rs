// Core modules
pub mod backtest;
pub mod config;
pub mod db;
pub mod events;
pub mod execution;
pub mod indicators;
pub mod market;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod strategy;
pub mod transport;

// Re-export commonly used types
pub use models::*;
pub use strategy::{Strategy, StrategyKind};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
