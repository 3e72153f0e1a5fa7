use chrono::Utc;
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use tokio::time::{sleep, sleep_until, Duration, Instant};

use super::{ControllerAction, Outbox, TradeController};
use crate::config::VenueConfig;
use crate::persistence::MarketStore;
use crate::transport::{decode, encode, OutboundMessage, Transport, TransportError};
use crate::Result;

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// How many stored candles per symbol are replayed on startup
const RESTORE_CANDLES: usize = 200;

/// Why a connected session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Drives a [`TradeController`] over a transport and a store
///
/// Owns the reconnect loop, the outbound queue, request pacing and the
/// cooldown timer. All controller calls happen on this task.
pub struct Runtime<T: Transport, S: MarketStore> {
    controller: TradeController,
    transport: T,
    store: S,
    outbox: Outbox,
    limiter: DirectRateLimiter,
    send_spacing: Duration,
    venue: VenueConfig,
    cooldown_deadline: Option<Instant>,
    throttle_until: Option<Instant>,
}

impl<T: Transport, S: MarketStore> Runtime<T, S> {
    pub fn new(controller: TradeController, transport: T, store: S, venue: VenueConfig) -> Self {
        let per_second = NonZeroU32::new(venue.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Self {
            controller,
            transport,
            store,
            outbox: Outbox::new(venue.outbox_capacity),
            limiter,
            send_spacing: Duration::from_millis(1000 / per_second.get() as u64),
            venue,
            cooldown_deadline: None,
            throttle_until: None,
        }
    }

    pub fn controller(&self) -> &TradeController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut TradeController {
        &mut self.controller
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn into_parts(self) -> (TradeController, T, S) {
        (self.controller, self.transport, self.store)
    }

    /// Load trade history and recent candles from the store
    pub async fn restore(&mut self, symbols: &[String]) -> Result<()> {
        let trades = self.store.all_trades().await?;
        if !trades.is_empty() {
            self.controller.seed_history(trades);
        }

        for symbol in symbols {
            let candles = self.store.recent_candles(symbol, RESTORE_CANDLES).await?;
            if !candles.is_empty() {
                self.controller.seed_candles(symbol, candles);
            }
        }
        Ok(())
    }

    /// Run until `shutdown` resolves, the venue halts us, or reconnects are exhausted
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let backoff = Duration::from_secs(self.venue.reconnect_backoff_secs);
        let mut failures: u32 = 0;

        loop {
            match self.transport.connect().await {
                Ok(()) => {
                    failures = 0;
                    tracing::info!("🔌 Connected to venue");
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.venue.reconnect_max_retries {
                        tracing::error!("Giving up after {} failed connection attempts", failures);
                        return Err(e.into());
                    }
                    tracing::warn!(
                        "Connection attempt {}/{} failed: {} (retrying in {:?})",
                        failures,
                        self.venue.reconnect_max_retries,
                        e,
                        backoff
                    );
                    tokio::select! {
                        _ = shutdown.as_mut() => return Ok(()),
                        _ = sleep(backoff) => {}
                    }
                    continue;
                }
            }

            let handshake = self.controller.on_connected(Utc::now());
            let first: Vec<OutboundMessage> = handshake
                .into_iter()
                .filter_map(|action| match action {
                    ControllerAction::Send(message) => Some(message),
                    _ => None,
                })
                .collect();
            self.outbox.push_front_all(first);

            match self.session(&mut shutdown).await? {
                SessionEnd::Shutdown => {
                    tracing::info!("Shutdown requested, leaving session");
                    return Ok(());
                }
                SessionEnd::Disconnected => {
                    self.controller.on_disconnected();
                    // Only requests that still mean something on a new connection survive
                    self.outbox.retain(|m| m.request.survives_reconnect());
                    tracing::warn!("⚠️  Venue connection lost, reconnecting in {:?}", backoff);
                    tokio::select! {
                        _ = shutdown.as_mut() => return Ok(()),
                        _ = sleep(backoff) => {}
                    }
                }
            }
        }
    }

    async fn session<F>(&mut self, shutdown: &mut Pin<&mut F>) -> Result<SessionEnd>
    where
        F: Future<Output = ()>,
    {
        loop {
            let flush_wait = match self.flush().await {
                Ok(wait) => wait,
                Err(e) => {
                    tracing::warn!("Send failed: {}", e);
                    return Ok(SessionEnd::Disconnected);
                }
            };

            let flush_at = flush_wait.map(|wait| Instant::now() + wait);
            let cooldown_at = self.cooldown_deadline;

            tokio::select! {
                _ = shutdown.as_mut() => return Ok(SessionEnd::Shutdown),

                frame = self.transport.recv() => match frame {
                    Ok(Some(frame)) => {
                        let inbound = match decode(&frame) {
                            Ok(inbound) => inbound,
                            Err(e) => {
                                tracing::warn!("Dropping venue message: {}", e);
                                continue;
                            }
                        };
                        let actions = self.controller.handle(inbound, Utc::now());
                        self.apply(actions).await?;
                    }
                    Ok(None) => return Ok(SessionEnd::Disconnected),
                    Err(e) => {
                        tracing::warn!("Receive failed: {}", e);
                        return Ok(SessionEnd::Disconnected);
                    }
                },

                _ = sleep_until(cooldown_at.unwrap_or_else(Instant::now)), if cooldown_at.is_some() => {
                    self.cooldown_deadline = None;
                    let actions = self.controller.on_cooldown_timer(Utc::now());
                    self.apply(actions).await?;
                }

                _ = sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {}
            }
        }
    }

    /// Send queued requests until the queue empties or pacing holds it back
    ///
    /// Returns how long to wait before trying again when messages remain.
    async fn flush(&mut self) -> std::result::Result<Option<Duration>, TransportError> {
        if let Some(until) = self.throttle_until {
            let now = Instant::now();
            if now < until {
                return Ok((!self.outbox.is_empty()).then(|| until - now));
            }
            self.throttle_until = None;
        }

        while let Some(message) = self.outbox.pop() {
            if self.limiter.check().is_err() {
                self.outbox.requeue(message);
                return Ok(Some(self.send_spacing));
            }

            let frame = match encode(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Failed to encode request #{}: {}", message.req_id, e);
                    continue;
                }
            };

            if let Err(e) = self.transport.send(frame).await {
                self.outbox.requeue(message);
                return Err(e);
            }
            tracing::debug!("→ #{} {}", message.req_id, message.request.kind());
        }

        Ok(None)
    }

    async fn apply(&mut self, actions: Vec<ControllerAction>) -> Result<()> {
        for action in actions {
            match action {
                ControllerAction::Send(message) => self.outbox.push(message),
                ControllerAction::SaveTick(tick) => {
                    if let Err(e) = self.store.save_tick(&tick).await {
                        tracing::warn!("Failed to save tick for {}: {}", tick.symbol, e);
                    }
                }
                ControllerAction::SaveCandle(candle) => {
                    if let Err(e) = self.store.save_candle(&candle).await {
                        tracing::warn!("Failed to save candle for {}: {}", candle.symbol, e);
                    }
                }
                ControllerAction::SaveTrade(record) => {
                    if let Err(e) = self.store.save_trade(&record).await {
                        tracing::error!("Failed to save trade {}: {}", record.id, e);
                    }
                }
                ControllerAction::ScheduleCooldown(delay) => {
                    tracing::info!("⏸️  Cooldown re-check in {:?}", delay);
                    self.cooldown_deadline = Some(Instant::now() + delay);
                }
                ControllerAction::Throttle(delay) => {
                    let until = Instant::now() + delay;
                    self.throttle_until = Some(self.throttle_until.map_or(until, |t| t.max(until)));
                }
                ControllerAction::Halt(reason) => {
                    tracing::error!("🛑 Halting: {}", reason);
                    return Err(reason.into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradeConfig;
    use crate::events::{ControllerState, EventBus};
    use crate::persistence::MemoryStore;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    fn venue_config() -> VenueConfig {
        VenueConfig {
            api_token: "token".to_string(),
            reconnect_backoff_secs: 0,
            reconnect_max_retries: 1,
            requests_per_second: 100,
            ..VenueConfig::default()
        }
    }

    fn runtime(transport: ChannelTransport) -> Runtime<ChannelTransport, MemoryStore> {
        let venue = venue_config();
        let controller = TradeController::new(TradeConfig::default(), &venue, EventBus::new());
        Runtime::new(controller, transport, MemoryStore::default(), venue)
    }

    #[tokio::test]
    async fn test_authorize_is_first_request() {
        let (transport, mut venue) = ChannelTransport::pair();
        let mut rt = runtime(transport);

        let handle = tokio::spawn(async move {
            let request = venue.next_request().await.unwrap();
            assert_eq!(request["authorize"], "token");
            venue.reply(json!({
                "msg_type": "authorize",
                "req_id": request["req_id"],
                "authorize": {"loginid": "VRTC1", "balance": 1000.0, "currency": "USD"}
            }));
            // Balance and tick subscriptions follow
            let balance = venue.next_request().await.unwrap();
            let ticks = venue.next_request().await.unwrap();
            (balance, ticks, venue)
        });

        let (balance, ticks, _venue) = {
            let shutdown = async {
                tokio::time::sleep(Duration::from_millis(200)).await;
            };
            rt.run_until(shutdown).await.unwrap();
            handle.await.unwrap()
        };

        assert_eq!(balance["balance"], 1);
        assert_eq!(ticks["ticks"], "R_100");
        assert_eq!(rt.controller().state(), ControllerState::Trading);
        assert_eq!(rt.controller().session().balance, 1000.0);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let (transport, venue) = ChannelTransport::pair();
        drop(venue);
        let mut rt = runtime(transport);

        let result = rt.run_until(std::future::pending::<()>()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_auth_error_halts() {
        let (transport, mut venue) = ChannelTransport::pair();
        let mut rt = runtime(transport);

        tokio::spawn(async move {
            let request = venue.next_request().await.unwrap();
            venue.reply(json!({
                "msg_type": "authorize",
                "req_id": request["req_id"],
                "error": {"code": "InvalidToken", "message": "The token is invalid."}
            }));
            // Keep the endpoint alive until the runtime exits
            venue.next_request().await
        });

        let result = rt.run_until(std::future::pending::<()>()).await;
        assert!(result.is_err());
    }
}
