use chrono::Utc;
use optionbot::config::{TradeConfig, VenueConfig};
use optionbot::events::{BotEvent, ControllerState, EventBus};
use optionbot::execution::{Runtime, TradeController};
use optionbot::indicators::IndicatorSnapshot;
use optionbot::persistence::{MarketStore, MemoryStore};
use optionbot::strategy::StrategyKind;
use optionbot::transport::{ChannelTransport, VenueEndpoint};
use optionbot::*;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

const SYMBOL: &str = "R_100";
// 2024-03-01 12:00:00 UTC
const START_EPOCH: i64 = 1_709_294_400;

fn venue_config() -> VenueConfig {
    VenueConfig {
        api_token: "demo-token".to_string(),
        reconnect_backoff_secs: 0,
        reconnect_max_retries: 0,
        requests_per_second: 1000,
        ..VenueConfig::default()
    }
}

async fn expect_request(venue: &mut VenueEndpoint, key: &str) -> Value {
    let request = tokio::time::timeout(Duration::from_secs(5), venue.next_request())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{}' request", key))
        .expect("bot closed the connection");
    assert!(request.get(key).is_some(), "expected '{}' request, got {}", key, request);
    request
}

/// Scripted venue: authorise, stream a falling market, fill one CALL, settle it as a win
async fn scripted_venue(mut venue: VenueEndpoint) -> (VenueEndpoint, Vec<Value>) {
    let mut seen = Vec::new();

    let auth = expect_request(&mut venue, "authorize").await;
    assert_eq!(auth["authorize"], "demo-token");
    venue.reply(json!({
        "msg_type": "authorize",
        "req_id": auth["req_id"],
        "authorize": {"loginid": "VRTC1", "balance": 1000.0, "currency": "USD"}
    }));
    seen.push(auth);

    seen.push(expect_request(&mut venue, "balance").await);
    let ticks = expect_request(&mut venue, "ticks").await;
    assert_eq!(ticks["ticks"], SYMBOL);
    seen.push(ticks);

    for i in 0..15 {
        venue.reply(json!({
            "msg_type": "tick",
            "tick": {
                "symbol": SYMBOL,
                "quote": 100.0 - 0.1 * i as f64,
                "epoch": START_EPOCH + 60 * i
            }
        }));
    }

    let proposal = expect_request(&mut venue, "proposal").await;
    assert_eq!(proposal["contract_type"], "CALL");
    assert_eq!(proposal["symbol"], SYMBOL);
    venue.reply(json!({
        "msg_type": "proposal",
        "req_id": proposal["req_id"],
        "proposal": {"id": "P-1", "ask_price": 10.0, "payout": 18.5}
    }));
    seen.push(proposal);

    let buy = expect_request(&mut venue, "buy").await;
    assert_eq!(buy["buy"], "P-1");
    venue.reply(json!({
        "msg_type": "buy",
        "req_id": buy["req_id"],
        "buy": {"contract_id": 555, "buy_price": 10.0, "shortcode": "CALL_R_100"}
    }));
    seen.push(buy);

    let open = expect_request(&mut venue, "proposal_open_contract").await;
    assert_eq!(open["contract_id"], 555);
    venue.reply(json!({
        "msg_type": "proposal_open_contract",
        "req_id": open["req_id"],
        "proposal_open_contract": {
            "contract_id": 555,
            "is_sold": 1,
            "sell_price": 18.5,
            "buy_price": 10.0,
            "profit": 8.5
        }
    }));
    seen.push(open);

    (venue, seen)
}

#[tokio::test]
async fn test_full_trade_lifecycle_over_channel_transport() {
    let _ = tracing_subscriber::fmt::try_init();

    let venue_cfg = venue_config();
    let events = EventBus::new();
    let mut settled = events.subscribe();

    let (transport, venue) = ChannelTransport::pair();
    let controller = TradeController::new(TradeConfig::default(), &venue_cfg, events);
    let mut runtime = Runtime::new(controller, transport, MemoryStore::default(), venue_cfg);

    let script = tokio::spawn(scripted_venue(venue));

    // Stop once the first trade has been settled and recorded
    let shutdown = async move {
        loop {
            match settled.recv().await {
                Ok(BotEvent::TradeSettled(_)) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    };

    let result = tokio::time::timeout(Duration::from_secs(10), runtime.run_until(shutdown))
        .await
        .expect("runtime did not finish");
    tokio_test::assert_ok!(result);

    let (_venue, requests) = tokio_test::assert_ok!(script.await);
    let ids: Vec<u64> = requests.iter().filter_map(|r| r["req_id"].as_u64()).collect();
    assert_eq!(ids.len(), 6);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "request ids not increasing: {:?}", ids);

    let store = runtime.store();
    assert_eq!(store.trades().len(), 1);
    let record = &store.trades()[0];
    assert_eq!(record.contract_id, "555");
    assert_eq!(record.symbol, SYMBOL);
    assert_eq!(record.direction, Direction::Call);
    assert_eq!(record.result, TradeResult::Win);
    assert!((record.pnl - 8.5).abs() < 1e-9);
    assert_eq!(record.strategy, StrategyKind::RsiThreshold);

    assert_eq!(store.tick_count(SYMBOL), 15);
    assert_eq!(store.candle_count(SYMBOL), 14);

    let controller = runtime.controller();
    assert_eq!(controller.state(), ControllerState::Trading);
    assert!(controller.active_contract().is_none());
    assert_eq!(controller.history().len(), 1);
    assert_eq!(controller.session().total_trades, 1);
    assert!((controller.session().balance - 1008.5).abs() < 1e-9);
}

fn stored_trade(strategy: StrategyKind, pnl: f64) -> TradeRecord {
    TradeRecord {
        id: Uuid::new_v4(),
        contract_id: "old".to_string(),
        symbol: SYMBOL.to_string(),
        strategy,
        result: if pnl > 0.0 {
            TradeResult::Win
        } else {
            TradeResult::Loss
        },
        pnl,
        stake: 1.0,
        direction: Direction::Put,
        duration_secs: 60,
        indicators_at_entry: IndicatorSnapshot::default(),
        market_conditions_at_entry: MarketConditions::default(),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn test_restore_seeds_history_and_candles() {
    let venue_cfg = venue_config();
    let mut store = MemoryStore::default().with_trades(vec![
        stored_trade(StrategyKind::TrendFollow, 0.9),
        stored_trade(StrategyKind::TrendFollow, -1.0),
        stored_trade(StrategyKind::Grid, 0.9),
    ]);

    for i in 0..30 {
        let close = 100.0 + i as f64;
        let candle = Candle {
            symbol: SYMBOL.to_string(),
            period_start: chrono::DateTime::from_timestamp(START_EPOCH + 60 * i, 0).unwrap(),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 3.0,
        };
        tokio_test::assert_ok!(store.save_candle(&candle).await);
    }

    let (transport, _venue) = ChannelTransport::pair();
    let controller = TradeController::new(TradeConfig::default(), &venue_cfg, EventBus::new());
    let mut runtime = Runtime::new(controller, transport, store, venue_cfg);

    tokio_test::assert_ok!(runtime.restore(&[SYMBOL.to_string()]).await);

    let controller = runtime.controller();
    assert_eq!(controller.history().len(), 3);
    assert_eq!(controller.aggregator().candles(SYMBOL).len(), 30);
    let snapshot = controller.snapshot(SYMBOL).expect("snapshot after seeding");
    assert_eq!(snapshot.candle_count, 30);
}
