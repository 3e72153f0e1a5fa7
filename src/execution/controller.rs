use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;
use std::time::Duration;

use super::{RequestTracker, SessionState, TradeHistory};
use crate::config::{TradeConfig, VenueConfig};
use crate::events::{BotEvent, ControllerState, EventBus};
use crate::indicators::{
    classify_trend, CorrelationTable, IndicatorEngine, IndicatorKind, IndicatorSnapshot,
    SIDEWAYS_TOLERANCE,
};
use crate::market::CandleAggregator;
use crate::models::{ActiveContract, Candle, Direction, MarketConditions, Tick, TradeRecord};
use crate::risk::{CooldownOutcome, Denial, DenialEffect, RiskManager, MIN_STAKE};
use crate::strategy::{SignalEngine, StrategyKind, StrategySelector};
use crate::transport::{ContractUpdate, ErrorClass, Inbound, OutboundMessage, VenueMessage, VenueRequest};

/// Stake multiplier applied when the venue rejects a stake
pub const STAKE_RETRY_FACTOR: f64 = 0.9;

/// Side effects requested by the controller, executed by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerAction {
    Send(OutboundMessage),
    SaveTick(Tick),
    SaveCandle(Candle),
    SaveTrade(TradeRecord),
    /// Re-check the cooldown after this delay
    ScheduleCooldown(Duration),
    /// Hold outbound traffic for this long
    Throttle(Duration),
    /// Unrecoverable venue rejection
    Halt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStage {
    AwaitingProposal { req_id: u64 },
    AwaitingBuy { req_id: u64 },
}

impl PendingStage {
    fn req_id(&self) -> u64 {
        match self {
            PendingStage::AwaitingProposal { req_id } | PendingStage::AwaitingBuy { req_id } => *req_id,
        }
    }
}

/// A trade attempt between the signal and the fill
#[derive(Debug, Clone)]
struct PendingTrade {
    symbol: String,
    direction: Direction,
    stake: f64,
    duration_secs: u64,
    strategy: StrategyKind,
    indicators: IndicatorSnapshot,
    conditions: MarketConditions,
    stage: PendingStage,
    stake_retried: bool,
}

/// Owns one trading session: signal, stake, submit, monitor, settle, record
///
/// The controller performs no I/O. Every entry point takes the current time
/// and returns the [`ControllerAction`]s the runtime must carry out, so the
/// whole lifecycle runs on a single logical thread.
pub struct TradeController {
    config: TradeConfig,
    api_token: String,
    rate_limit_backoff: Duration,
    state: ControllerState,
    connected: bool,
    aggregator: CandleAggregator,
    engine: IndicatorEngine,
    signals: SignalEngine,
    risk: RiskManager,
    selector: StrategySelector,
    history: TradeHistory,
    session: SessionState,
    requests: RequestTracker,
    snapshots: HashMap<String, IndicatorSnapshot>,
    pending: Option<PendingTrade>,
    active: Option<ActiveContract>,
    contract_subscription: Option<u64>,
    exit_requested: bool,
    last_trade_at: Option<DateTime<Utc>>,
    /// Symbol whose denial engaged the current pause
    cooldown_symbol: Option<String>,
    events: EventBus,
}

impl TradeController {
    pub fn new(config: TradeConfig, venue: &VenueConfig, events: EventBus) -> Self {
        Self {
            api_token: venue.api_token.clone(),
            rate_limit_backoff: Duration::from_millis(venue.rate_limit_backoff_ms),
            state: ControllerState::Idle,
            connected: false,
            aggregator: CandleAggregator::new(config.candle_timeframe_secs, config.candle_capacity),
            engine: IndicatorEngine::new(config.indicators.clone()),
            signals: SignalEngine::new(&config),
            risk: RiskManager::new(&config),
            selector: StrategySelector::new(config.strategy),
            history: TradeHistory::new(config.history_capacity),
            session: SessionState::new(0.0, config.initial_stake),
            requests: RequestTracker::new(),
            snapshots: HashMap::new(),
            pending: None,
            active: None,
            contract_subscription: None,
            exit_requested: false,
            last_trade_at: None,
            cooldown_symbol: None,
            events,
            config,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn history(&self) -> &TradeHistory {
        &self.history
    }

    pub fn active_contract(&self) -> Option<&ActiveContract> {
        self.active.as_ref()
    }

    pub fn has_pending_trade(&self) -> bool {
        self.pending.is_some()
    }

    pub fn current_strategy(&self) -> StrategyKind {
        self.selector.current()
    }

    pub fn snapshot(&self, symbol: &str) -> Option<&IndicatorSnapshot> {
        self.snapshots.get(symbol)
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Pairwise correlation of every tracked symbol
    pub fn correlations(&self) -> CorrelationTable {
        self.engine.correlate(&self.aggregator.candle_map())
    }

    /// Load settled trades from storage; retrains the scorer
    pub fn seed_history(&mut self, records: Vec<TradeRecord>) {
        self.history = TradeHistory::with_records(self.config.history_capacity, records);
        self.signals.retrain(&self.history.to_vec());
        if self.config.dynamic_switching {
            self.switch_strategy();
        }
        tracing::info!(
            "📚 Loaded {} historical trades (scorer trained: {})",
            self.history.len(),
            self.signals.scorer_trained()
        );
    }

    /// Load stored candles for `symbol`, oldest first
    pub fn seed_candles(&mut self, symbol: &str, candles: Vec<Candle>) {
        let loaded = self.aggregator.seed(symbol, candles);
        if loaded > 0 {
            let snapshot = self.engine.update(&self.aggregator.candles(symbol));
            self.snapshots.insert(symbol.to_string(), snapshot);
            tracing::info!("Seeded {} candles for {}", loaded, symbol);
        }
    }

    /// Transport opened: authorise before anything else
    pub fn on_connected(&mut self, now: DateTime<Utc>) -> Vec<ControllerAction> {
        self.connected = true;
        self.requests.clear();
        self.set_state(ControllerState::Connected);

        let authorize = self.requests.register(
            VenueRequest::Authorize {
                token: self.api_token.clone(),
            },
            now,
        );
        vec![ControllerAction::Send(authorize)]
    }

    /// Transport closed: in-flight requests are gone and an unfilled trade is abandoned
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.requests.clear();
        self.contract_subscription = None;
        self.exit_requested = false;
        if let Some(pending) = self.pending.take() {
            tracing::warn!(
                "Abandoning unfilled {} trade on {} after disconnect",
                pending.direction,
                pending.symbol
            );
        }
        self.set_state(ControllerState::Idle);
    }

    /// Explicit user restart of a stopped or paused session
    pub fn restart(&mut self) {
        tracing::info!("🔄 Session reset by user");
        self.session.reset(self.config.initial_stake);
        self.last_trade_at = None;
        if self.connected {
            self.set_state(ControllerState::Trading);
        }
    }

    /// Dispatch one inbound venue message
    pub fn handle(&mut self, inbound: Inbound, now: DateTime<Utc>) -> Vec<ControllerAction> {
        let mut actions = Vec::new();
        let req_id = inbound.req_id;

        match inbound.message {
            VenueMessage::Error { code, message } => {
                self.on_venue_error(req_id, &code, &message, now, &mut actions)
            }
            VenueMessage::Authorized {
                login_id,
                balance,
                currency,
            } => self.on_authorized(req_id, &login_id, balance, &currency, now, &mut actions),
            VenueMessage::Balance { balance, .. } => self.on_balance(balance),
            VenueMessage::Tick(tick) => self.on_tick(tick, now, &mut actions),
            VenueMessage::Proposal {
                proposal_id,
                ask_price,
                ..
            } => self.on_proposal(req_id, proposal_id, ask_price, now, &mut actions),
            VenueMessage::Bought {
                contract_id,
                buy_price,
                ..
            } => self.on_bought(req_id, contract_id, buy_price, now, &mut actions),
            VenueMessage::Contract(update) => self.on_contract_update(update, now, &mut actions),
            VenueMessage::Sold { sold_for } => {
                if let Some(id) = req_id {
                    self.requests.resolve(id);
                }
                tracing::info!("Sell confirmed at {:.2}", sold_for);
            }
            VenueMessage::Ack { msg_type } => {
                tracing::debug!("Ignoring venue message '{}'", msg_type);
            }
        }

        actions
    }

    /// Cooldown timer fired
    pub fn on_cooldown_timer(&mut self, now: DateTime<Utc>) -> Vec<ControllerAction> {
        if !self.session.is_paused {
            return Vec::new();
        }

        let symbol = self
            .cooldown_symbol
            .clone()
            .or_else(|| self.config.symbols.first().cloned())
            .unwrap_or_default();
        let snapshot = self.snapshots.get(&symbol).cloned().unwrap_or_default();
        let conditions = self.market_conditions(&symbol, &snapshot, now);

        match self.risk.recheck_cooldown(&mut self.session, &conditions) {
            CooldownOutcome::Extended { .. } => {
                vec![ControllerAction::ScheduleCooldown(self.risk.cooldown_period())]
            }
            outcome => {
                let forced = outcome == CooldownOutcome::ForcedResume;
                self.events.publish(BotEvent::CooldownLifted { forced });
                if self.state == ControllerState::Paused {
                    self.set_state(ControllerState::Trading);
                }
                Vec::new()
            }
        }
    }

    fn set_state(&mut self, to: ControllerState) {
        if self.state == to {
            return;
        }
        tracing::info!("State {:?} -> {:?}", self.state, to);
        self.events.publish(BotEvent::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
    }

    fn resume_state(&self) -> ControllerState {
        if self.session.is_stopped {
            ControllerState::Stopped
        } else if self.session.is_paused {
            ControllerState::Paused
        } else {
            ControllerState::Trading
        }
    }

    fn send(&mut self, request: VenueRequest, now: DateTime<Utc>, actions: &mut Vec<ControllerAction>) -> u64 {
        let message = self.requests.register(request, now);
        let req_id = message.req_id;
        actions.push(ControllerAction::Send(message));
        req_id
    }

    fn on_authorized(
        &mut self,
        req_id: Option<u64>,
        login_id: &str,
        balance: f64,
        currency: &str,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        if let Some(id) = req_id {
            self.requests.resolve(id);
        }
        tracing::info!("🔑 Authorized as {} ({:.2} {})", login_id, balance, currency);
        self.on_balance(balance);

        self.send(VenueRequest::BalanceSubscribe, now, actions);
        for symbol in self.config.symbols.clone() {
            self.send(VenueRequest::TicksSubscribe { symbol }, now, actions);
        }
        if let Some(contract_id) = self.active.as_ref().map(|c| c.id.clone()) {
            tracing::info!("Re-subscribing to open contract {}", contract_id);
            let id = self.send(VenueRequest::ContractSubscribe { contract_id }, now, actions);
            self.contract_subscription = Some(id);
        }

        let next = self.resume_state();
        self.set_state(next);
    }

    fn on_balance(&mut self, balance: f64) {
        if !balance.is_finite() || balance < 0.0 {
            tracing::warn!("Ignoring invalid balance {}", balance);
            return;
        }
        self.session.balance = balance;
        self.events.publish(BotEvent::BalanceUpdated { balance });
    }

    fn on_tick(&mut self, tick: Tick, now: DateTime<Utc>, actions: &mut Vec<ControllerAction>) {
        let sealed = match self.aggregator.add_tick(&tick) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::warn!("Dropping tick: {}", e);
                return;
            }
        };

        let symbol = tick.symbol.clone();
        actions.push(ControllerAction::SaveTick(tick));

        let Some(candle) = sealed else {
            return;
        };
        actions.push(ControllerAction::SaveCandle(candle));

        let snapshot = self.engine.update(&self.aggregator.candles(&symbol));
        self.snapshots.insert(symbol.clone(), snapshot);

        if self.config.symbols.contains(&symbol) {
            self.evaluate(&symbol, now, actions);
        }
    }

    fn market_conditions(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        now: DateTime<Utc>,
    ) -> MarketConditions {
        let peer_prices = self
            .config
            .symbols
            .iter()
            .filter_map(|s| self.aggregator.last_price(s).map(|p| (s.clone(), p)))
            .collect();

        MarketConditions {
            trend: classify_trend(
                snapshot.short_moving_average,
                snapshot.moving_average,
                SIDEWAYS_TOLERANCE,
            ),
            volatility: snapshot.volatility,
            adx: snapshot.adx,
            in_blackout: self.risk.in_blackout(now),
            pattern: self.aggregator.detect_pattern(symbol),
            hour: now.hour(),
            peer_prices,
        }
    }

    fn evaluate(&mut self, symbol: &str, now: DateTime<Utc>, actions: &mut Vec<ControllerAction>) {
        if self.state != ControllerState::Trading
            || self.active.is_some()
            || self.pending.is_some()
            || self.session.is_paused
        {
            return;
        }

        if let Some(last) = self.last_trade_at {
            let elapsed = (now - last).num_seconds();
            if elapsed < self.config.min_trade_interval_secs as i64 {
                tracing::debug!("Trade interval not elapsed ({}s)", elapsed);
                return;
            }
        }

        let Some(snapshot) = self.snapshots.get(symbol).cloned() else {
            return;
        };
        let candles = self.aggregator.candles(symbol);
        let conditions = self.market_conditions(symbol, &snapshot, now);
        let strategy = self.selector.current();

        let signal = self.signals.evaluate(strategy, &snapshot, &candles, &conditions);
        if !signal.should_trade {
            tracing::debug!(symbol, "No trade: {}", signal.reason);
            return;
        }

        self.events.publish(BotEvent::Signal {
            symbol: symbol.to_string(),
            strategy,
            direction: signal.direction,
            confidence: signal.confidence,
            reason: signal.reason.clone(),
        });

        let stake = self.risk.size_stake(
            &self.session,
            &self.config,
            self.session.last_result,
            &snapshot,
            &self.history.stats(),
        );

        if let Err(denial) = self
            .risk
            .can_trade(&mut self.session, &self.config, &snapshot, stake, now)
        {
            self.on_denial(symbol, &denial, actions);
            return;
        }

        tracing::info!(
            symbol,
            "📈 {} {} stake {:.2} for {}s ({:.0}% confidence): {}",
            strategy,
            signal.direction,
            stake,
            self.config.duration_secs,
            signal.confidence * 100.0,
            signal.reason
        );

        let req_id = self.send(
            VenueRequest::Proposal {
                symbol: symbol.to_string(),
                direction: signal.direction,
                stake,
                duration_secs: self.config.duration_secs,
                currency: self.config.currency.clone(),
            },
            now,
            actions,
        );

        self.pending = Some(PendingTrade {
            symbol: symbol.to_string(),
            direction: signal.direction,
            stake,
            duration_secs: self.config.duration_secs,
            strategy,
            indicators: snapshot,
            conditions,
            stage: PendingStage::AwaitingProposal { req_id },
            stake_retried: false,
        });
    }

    fn on_denial(&mut self, symbol: &str, denial: &Denial, actions: &mut Vec<ControllerAction>) {
        let reason = denial.to_string();
        self.events.publish(BotEvent::TradeDenied {
            reason: reason.clone(),
        });

        match denial.effect() {
            DenialEffect::Stop => {
                self.set_state(ControllerState::Stopped);
                self.events.publish(BotEvent::SessionStopped { reason });
            }
            DenialEffect::Cooldown => {
                self.cooldown_symbol = Some(symbol.to_string());
                self.set_state(ControllerState::Paused);
                self.events.publish(BotEvent::CooldownEngaged { reason });
                actions.push(ControllerAction::ScheduleCooldown(self.risk.cooldown_period()));
            }
            DenialEffect::None => {}
        }
    }

    fn on_proposal(
        &mut self,
        req_id: Option<u64>,
        proposal_id: String,
        ask_price: f64,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        let Some(req_id) = req_id.filter(|id| self.requests.resolve(*id).is_some()) else {
            tracing::debug!("Ignoring proposal {} with unknown request id", proposal_id);
            return;
        };
        let awaiting = matches!(
            &self.pending,
            Some(p) if p.stage == PendingStage::AwaitingProposal { req_id }
        );
        if !awaiting {
            tracing::debug!("Ignoring stale proposal {}", proposal_id);
            return;
        }

        let buy_id = self.send(
            VenueRequest::Buy {
                proposal_id,
                price: ask_price,
            },
            now,
            actions,
        );
        if let Some(pending) = self.pending.as_mut() {
            pending.stage = PendingStage::AwaitingBuy { req_id: buy_id };
        }
    }

    fn on_bought(
        &mut self,
        req_id: Option<u64>,
        contract_id: String,
        buy_price: f64,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        let Some(req_id) = req_id.filter(|id| self.requests.resolve(*id).is_some()) else {
            tracing::warn!("Buy confirmation for contract {} has unknown request id", contract_id);
            return;
        };
        let awaiting = matches!(
            &self.pending,
            Some(p) if p.stage == PendingStage::AwaitingBuy { req_id }
        );
        if !awaiting {
            tracing::warn!("Buy confirmation for contract {} matches no pending trade", contract_id);
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        tracing::info!(
            symbol = %pending.symbol,
            "✅ Bought {} contract {} for {:.2}",
            pending.direction,
            contract_id,
            buy_price
        );
        self.events.publish(BotEvent::TradeOpened {
            contract_id: contract_id.clone(),
            symbol: pending.symbol.clone(),
            direction: pending.direction,
            stake: pending.stake,
        });

        self.session.current_stake = pending.stake;
        self.last_trade_at = Some(now);
        self.exit_requested = false;

        let subscription = self.send(
            VenueRequest::ContractSubscribe {
                contract_id: contract_id.clone(),
            },
            now,
            actions,
        );
        self.contract_subscription = Some(subscription);

        self.active = Some(ActiveContract {
            id: contract_id,
            symbol: pending.symbol,
            stake: pending.stake,
            direction: pending.direction,
            buy_price,
            start_time: now,
            duration_secs: pending.duration_secs,
            strategy: pending.strategy,
            entry_indicators: pending.indicators,
            entry_conditions: pending.conditions,
        });
    }

    fn on_contract_update(
        &mut self,
        update: ContractUpdate,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        let matches = self
            .active
            .as_ref()
            .map(|c| c.id == update.contract_id)
            .unwrap_or(false);
        if !matches {
            tracing::debug!("Update for untracked contract {}", update.contract_id);
            return;
        }

        if update.is_sold {
            let sell_price = update
                .sell_price
                .unwrap_or(update.buy_price + update.profit);
            match self.close_contract(&update.contract_id) {
                Ok(contract) => self.settle(contract, sell_price, now, actions),
                Err(e) => tracing::warn!("Cannot settle: {}", e),
            }
        } else {
            self.check_early_exit(&update, now, actions);
        }
    }

    /// Detach the open contract `contract_id` and its subscription
    fn close_contract(&mut self, contract_id: &str) -> anyhow::Result<ActiveContract> {
        match self.active.as_ref() {
            Some(active) if active.id == contract_id => {}
            Some(active) => anyhow::bail!(
                "contract {} is not the open contract {}",
                contract_id,
                active.id
            ),
            None => anyhow::bail!("no open contract to close ({})", contract_id),
        }

        if let Some(id) = self.contract_subscription.take() {
            self.requests.forget(id);
        }
        self.exit_requested = false;
        self.active
            .take()
            .ok_or_else(|| anyhow::anyhow!("contract {} vanished", contract_id))
    }

    fn settle(
        &mut self,
        contract: ActiveContract,
        sell_price: f64,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        let record = TradeRecord::from_contract(&contract, sell_price, now);
        self.session.record(record.result, record.pnl);

        tracing::info!(
            symbol = %record.symbol,
            "💰 Contract {} settled: {:?} {:+.2} (session PnL {:+.2}, balance {:.2})",
            record.contract_id,
            record.result,
            record.pnl,
            self.session.total_pnl,
            self.session.balance
        );

        self.history.push(record.clone());
        self.signals.retrain(&self.history.to_vec());
        if self.config.dynamic_switching {
            self.switch_strategy();
        }

        self.events.publish(BotEvent::TradeSettled(record.clone()));
        actions.push(ControllerAction::SaveTrade(record));
    }

    fn switch_strategy(&mut self) {
        let from = self.selector.current();
        if let Some(to) = self.selector.reselect(&self.history) {
            self.events.publish(BotEvent::StrategySwitched { from, to });
        }
    }

    /// Close a profitable contract early when price action turns against it
    fn check_early_exit(
        &mut self,
        update: &ContractUpdate,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        if !self.config.early_exit_enabled || self.exit_requested {
            return;
        }
        let Some(contract) = self.active.as_ref() else {
            return;
        };
        if contract.stake <= 0.0 || update.profit / contract.stake <= self.config.early_exit_profit_ratio {
            return;
        }
        let Some(snapshot) = self.snapshots.get(&contract.symbol) else {
            return;
        };
        if !snapshot.is_available(IndicatorKind::Bollinger)
            || !snapshot.is_available(IndicatorKind::MacdSignal)
        {
            return;
        }
        let Some(spot) = update
            .current_spot
            .or_else(|| self.aggregator.last_price(&contract.symbol))
        else {
            return;
        };

        let histogram = snapshot.macd.histogram;
        let reversal = match contract.direction {
            Direction::Call => spot > snapshot.bollinger.upper && histogram < 0.0,
            Direction::Put => spot < snapshot.bollinger.lower && histogram > 0.0,
        };
        if !reversal {
            return;
        }

        let contract_id = contract.id.clone();
        tracing::info!(
            "⏏️  Early exit on {}: profit {:.2}, spot {:.4} beyond band, MACD hist {:.5}",
            contract_id,
            update.profit,
            spot,
            histogram
        );
        self.events.publish(BotEvent::EarlyExit {
            contract_id: contract_id.clone(),
            profit: update.profit,
        });
        self.exit_requested = true;
        self.send(VenueRequest::Sell { contract_id }, now, actions);
    }

    fn on_venue_error(
        &mut self,
        req_id: Option<u64>,
        code: &str,
        message: &str,
        now: DateTime<Utc>,
        actions: &mut Vec<ControllerAction>,
    ) {
        let class = ErrorClass::from_code(code);
        let failed = req_id.and_then(|id| self.requests.forget(id));
        let kind = failed.as_ref().map(|p| p.request.kind()).unwrap_or("unknown");
        tracing::warn!("Venue rejected {} request: {} ({})", kind, message, code);

        let pending_failed = match (&self.pending, req_id) {
            (Some(p), Some(id)) => p.stage.req_id() == id,
            _ => false,
        };

        match class {
            ErrorClass::Auth => {
                self.events.publish(BotEvent::Warning {
                    message: format!("authorization failed: {}", message),
                });
                actions.push(ControllerAction::Halt(format!("{}: {}", code, message)));
                return;
            }
            ErrorClass::RateLimit => {
                actions.push(ControllerAction::Throttle(self.rate_limit_backoff));
                if let Some(failed) = failed {
                    let retry_id = self.send(failed.request, now, actions);
                    if pending_failed {
                        if let Some(pending) = self.pending.as_mut() {
                            pending.stage = match pending.stage {
                                PendingStage::AwaitingProposal { .. } => {
                                    PendingStage::AwaitingProposal { req_id: retry_id }
                                }
                                PendingStage::AwaitingBuy { .. } => {
                                    PendingStage::AwaitingBuy { req_id: retry_id }
                                }
                            };
                        }
                    }
                }
                return;
            }
            ErrorClass::InvalidStake if pending_failed => {
                if self.retry_with_smaller_stake(now, actions) {
                    return;
                }
            }
            _ => {}
        }

        if matches!(failed.as_ref().map(|p| &p.request), Some(VenueRequest::Sell { .. })) {
            self.exit_requested = false;
        }

        if pending_failed {
            if let Some(pending) = self.pending.take() {
                tracing::warn!(
                    "Abandoning {} trade on {}: {}",
                    pending.direction,
                    pending.symbol,
                    message
                );
                self.events.publish(BotEvent::TradeDenied {
                    reason: format!("venue rejected: {}", message),
                });
            }
        }
    }

    /// Resubmit the pending proposal once with a reduced stake
    fn retry_with_smaller_stake(&mut self, now: DateTime<Utc>, actions: &mut Vec<ControllerAction>) -> bool {
        let Some(pending) = self.pending.as_ref() else {
            return false;
        };
        let stake = (pending.stake * STAKE_RETRY_FACTOR).max(MIN_STAKE);
        if pending.stake_retried || stake >= pending.stake {
            return false;
        }

        tracing::info!("Retrying with stake {:.2} (was {:.2})", stake, pending.stake);
        let request = VenueRequest::Proposal {
            symbol: pending.symbol.clone(),
            direction: pending.direction,
            stake,
            duration_secs: pending.duration_secs,
            currency: self.config.currency.clone(),
        };
        let req_id = self.send(request, now, actions);
        if let Some(pending) = self.pending.as_mut() {
            pending.stake = stake;
            pending.stake_retried = true;
            pending.stage = PendingStage::AwaitingProposal { req_id };
        }
        true
    }
}
