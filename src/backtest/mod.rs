// Offline replay of the decision pipeline
pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::{BacktestMetrics, RunCounters};
pub use runner::{BacktestRunner, DEFAULT_PAYOUT_RATIO};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
