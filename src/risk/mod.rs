// Risk management module
pub mod blackout;
pub mod cooldown;
pub mod gate;
pub mod manager;
pub mod sizing;

pub use blackout::{BlackoutCalendar, BlackoutWindow};
pub use cooldown::{is_favorable, AdaptiveCooldown, CooldownOutcome};
pub use gate::{Denial, DenialEffect, TradingGate};
pub use manager::RiskManager;
pub use sizing::{StakeOverlay, StakePolicy, MAX_STAKE, MIN_STAKE};
