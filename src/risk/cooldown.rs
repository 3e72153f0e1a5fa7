use std::time::Duration;

use crate::execution::SessionState;
use crate::models::{MarketConditions, Trend};

/// Volatility (%) at or below which the market is calm enough to resume
pub const RESUME_MAX_VOLATILITY: f64 = 2.5;
/// ADX at or below which the market is calm enough to resume
pub const RESUME_MAX_ADX: f64 = 25.0;
pub const MAX_PAUSE_EXTENSIONS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownOutcome {
    /// Market turned favorable; trading resumes
    Resumed,
    /// Still unfavorable; paused for another period
    Extended { extensions: u32 },
    /// Extension cap reached; trading resumes with counters reset
    ForcedResume,
}

/// Whether a paused session may resume in these conditions
pub fn is_favorable(conditions: &MarketConditions) -> bool {
    conditions.trend != Trend::Sideways
        && conditions.volatility <= RESUME_MAX_VOLATILITY
        && conditions.adx <= RESUME_MAX_ADX
        && !conditions.in_blackout
}

/// ACTIVE / PAUSED state machine driven by gate denials and timed re-checks
///
/// The pause flag and extension counter live on [`SessionState`]; this type
/// holds the timing rules.
#[derive(Debug, Clone)]
pub struct AdaptiveCooldown {
    period: Duration,
    max_extensions: u32,
}

impl AdaptiveCooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            max_extensions: MAX_PAUSE_EXTENSIONS,
        }
    }

    /// Delay before the next re-check
    pub fn period(&self) -> Duration {
        self.period
    }

    /// ACTIVE -> PAUSED
    pub fn engage(&self, session: &mut SessionState, reason: &str) {
        if session.is_paused {
            return;
        }
        session.is_paused = true;
        session.pause_extensions += 1;
        tracing::warn!(
            "Cooldown engaged ({}), re-check in {}s",
            reason,
            self.period.as_secs()
        );
    }

    /// Timed re-check of a paused session
    pub fn recheck(&self, session: &mut SessionState, conditions: &MarketConditions) -> CooldownOutcome {
        if !session.is_paused {
            return CooldownOutcome::Resumed;
        }

        // Extensions accumulate across favorable resumes until a win clears them
        if session.pause_extensions >= self.max_extensions {
            session.is_paused = false;
            session.pause_extensions = 0;
            session.consecutive_losses = 0;
            tracing::warn!(
                "Cooldown extended {} times, forcing resume",
                self.max_extensions
            );
            return CooldownOutcome::ForcedResume;
        }

        if is_favorable(conditions) {
            session.is_paused = false;
            tracing::info!("Cooldown lifted: market favorable ({:?}, ADX {:.1})", conditions.trend, conditions.adx);
            return CooldownOutcome::Resumed;
        }

        session.pause_extensions += 1;
        tracing::info!(
            "Cooldown extended ({}/{}): trend {:?}, vol {:.2}%, ADX {:.1}",
            session.pause_extensions,
            self.max_extensions,
            conditions.trend,
            conditions.volatility,
            conditions.adx
        );
        CooldownOutcome::Extended {
            extensions: session.pause_extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn favorable() -> MarketConditions {
        MarketConditions {
            trend: Trend::Up,
            volatility: 1.0,
            adx: 22.0,
            ..MarketConditions::default()
        }
    }

    fn cooldown() -> AdaptiveCooldown {
        AdaptiveCooldown::new(Duration::from_secs(60))
    }

    #[test]
    fn test_favorable_conditions() {
        assert!(is_favorable(&favorable()));
        assert!(!is_favorable(&MarketConditions {
            trend: Trend::Sideways,
            ..favorable()
        }));
        assert!(!is_favorable(&MarketConditions {
            volatility: 2.6,
            ..favorable()
        }));
        assert!(!is_favorable(&MarketConditions {
            adx: 30.0,
            ..favorable()
        }));
        assert!(!is_favorable(&MarketConditions {
            in_blackout: true,
            ..favorable()
        }));
    }

    #[test]
    fn test_engage_is_idempotent_while_paused() {
        let mut session = SessionState::new(100.0, 1.0);
        let c = cooldown();
        c.engage(&mut session, "test");
        c.engage(&mut session, "test");

        assert!(session.is_paused);
        assert_eq!(session.pause_extensions, 1);
    }

    #[test]
    fn test_resume_when_favorable() {
        let mut session = SessionState::new(100.0, 1.0);
        let c = cooldown();
        c.engage(&mut session, "test");

        assert_eq!(c.recheck(&mut session, &favorable()), CooldownOutcome::Resumed);
        assert!(!session.is_paused);
        assert_eq!(session.pause_extensions, 1);
    }

    #[test]
    fn test_repeated_pauses_reach_the_cap_in_a_favorable_market() {
        let mut session = SessionState::new(100.0, 1.0);
        session.consecutive_losses = 5;
        let c = cooldown();

        c.engage(&mut session, "losses");
        assert_eq!(c.recheck(&mut session, &favorable()), CooldownOutcome::Resumed);
        c.engage(&mut session, "losses");
        assert_eq!(c.recheck(&mut session, &favorable()), CooldownOutcome::Resumed);
        c.engage(&mut session, "losses");
        assert_eq!(session.pause_extensions, 3);
        assert_eq!(c.recheck(&mut session, &favorable()), CooldownOutcome::ForcedResume);

        assert!(!session.is_paused);
        assert_eq!(session.pause_extensions, 0);
        assert_eq!(session.consecutive_losses, 0);
    }

    #[test]
    fn test_extension_cap_forces_resume() {
        let mut session = SessionState::new(100.0, 1.0);
        session.consecutive_losses = 5;
        let c = cooldown();
        let sideways = MarketConditions::default();

        c.engage(&mut session, "losses");
        assert_eq!(
            c.recheck(&mut session, &sideways),
            CooldownOutcome::Extended { extensions: 2 }
        );
        assert_eq!(
            c.recheck(&mut session, &sideways),
            CooldownOutcome::Extended { extensions: 3 }
        );
        assert_eq!(c.recheck(&mut session, &sideways), CooldownOutcome::ForcedResume);

        assert!(!session.is_paused);
        assert_eq!(session.pause_extensions, 0);
        assert_eq!(session.consecutive_losses, 0);
    }
}
