use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Direction, TradeRecord};
use crate::strategy::StrategyKind;

const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of the trade controller
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Connected,
    Trading,
    Paused,
    Stopped,
}

/// Notifications published by the controller for UIs, loggers and tests
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BotEvent {
    StateChanged {
        from: ControllerState,
        to: ControllerState,
    },
    Signal {
        symbol: String,
        strategy: StrategyKind,
        direction: Direction,
        confidence: f64,
        reason: String,
    },
    TradeDenied {
        reason: String,
    },
    TradeOpened {
        contract_id: String,
        symbol: String,
        direction: Direction,
        stake: f64,
    },
    EarlyExit {
        contract_id: String,
        profit: f64,
    },
    TradeSettled(TradeRecord),
    BalanceUpdated {
        balance: f64,
    },
    CooldownEngaged {
        reason: String,
    },
    CooldownLifted {
        forced: bool,
    },
    SessionStopped {
        reason: String,
    },
    StrategySwitched {
        from: StrategyKind,
        to: StrategyKind,
    },
    Warning {
        message: String,
    },
}

/// Broadcast hub for [`BotEvent`]s; clones share the same channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.sender.subscribe()
    }

    /// Publish and return the receiver count (0 when nobody listens)
    pub fn publish(&self, event: BotEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(BotEvent::BalanceUpdated { balance: 1.0 }), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(BotEvent::CooldownEngaged {
            reason: "drawdown".to_string(),
        });
        bus.publish(BotEvent::CooldownLifted { forced: false });

        assert!(matches!(rx.recv().await.unwrap(), BotEvent::CooldownEngaged { .. }));
        assert_eq!(rx.recv().await.unwrap(), BotEvent::CooldownLifted { forced: false });
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(BotEvent::StateChanged {
            from: ControllerState::Idle,
            to: ControllerState::Connected,
        })
        .unwrap();
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["to"], "Connected");
    }
}
