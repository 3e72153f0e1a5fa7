use anyhow::Result;
use clap::{Parser, Subcommand};
use optionbot::backtest::{BacktestRunner, MarketScenario, SyntheticDataGenerator};
use optionbot::config::AppConfig;
use optionbot::events::{BotEvent, EventBus};
use optionbot::execution::{Runtime, TradeController};
use optionbot::persistence::Storage;
use optionbot::strategy::StrategyKind;
use optionbot::transport::WsTransport;

#[derive(Parser)]
#[command(name = "optionbot", about = "Automated binary options trading agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the venue and trade live.
    Run {
        /// Path to a TOML config file. Defaults to ./optionbot.toml when present.
        #[arg(long)]
        config: Option<String>,
    },
    /// Replay synthetic candles through the decision pipeline.
    Backtest {
        /// Strategy id (rsi-threshold, trend-follow, mean-reversion, grid, arbitrage, custom, scored).
        #[arg(long)]
        strategy: Option<StrategyKind>,

        /// Number of candles to generate.
        #[arg(long, default_value_t = 1000)]
        candles: usize,

        /// RNG seed for the synthetic series.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Market scenario (uptrend, downtrend, ranging, volatile, reversal).
        #[arg(long, default_value_t = MarketScenario::Ranging)]
        scenario: MarketScenario,

        /// Starting balance.
        #[arg(long, default_value_t = 1000.0)]
        balance: f64,

        /// Path to a TOML config file for the risk and strategy settings.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_live(config.as_deref()).await,
        Commands::Backtest {
            strategy,
            candles,
            seed,
            scenario,
            balance,
            config,
        } => run_backtest(config.as_deref(), strategy, candles, seed, scenario, balance),
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("optionbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    let (app, warnings) = AppConfig::load(path)?;
    for warning in &warnings {
        tracing::warn!("⚙️  {}", warning);
    }
    Ok(app)
}

async fn run_live(path: Option<&str>) -> Result<()> {
    let app = load_config(path)?;
    app.require_token()?;

    tracing::info!("🚀 OptionBot starting");
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Strategy: {}", app.trading.strategy);
    tracing::info!("  Symbols: {}", app.trading.symbols.join(", "));
    tracing::info!("  Duration: {}s", app.trading.duration_secs);
    tracing::info!("  Stake: {:?} / {:?}", app.trading.stake_policy, app.trading.stake_overlay);
    tracing::info!(
        "  Limits: {} trades, loss {:.2}, profit {:.2}, drawdown {:.1}%",
        app.trading.max_trades,
        app.trading.max_loss,
        app.trading.max_profit,
        app.trading.max_drawdown_pct
    );

    let storage = Storage::connect(&app.storage).await;
    let events = EventBus::new();
    spawn_event_logger(&events);

    let symbols = app.trading.symbols.clone();
    let controller = TradeController::new(app.trading, &app.venue, events);
    let transport = WsTransport::new(app.venue.ws_url.clone());
    let mut runtime = Runtime::new(controller, transport, storage, app.venue);

    if let Err(e) = runtime.restore(&symbols).await {
        tracing::warn!("Failed to restore stored state: {}", e);
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        tracing::info!("🛑 Shutdown signal received");
    };

    runtime
        .run_until(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let session = runtime.controller().session();
    tracing::info!(
        "👋 Session ended: {} trades ({} wins / {} losses), PnL {:+.2}, balance {:.2}",
        session.total_trades,
        session.wins,
        session.losses,
        session.total_pnl,
        session.balance
    );
    Ok(())
}

/// Mirror settled trades and lifecycle changes to the log
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(BotEvent::TradeSettled(record)) => {
                    tracing::info!(
                        "📒 {} {} {} {:?} {:+.2}",
                        record.symbol,
                        record.strategy,
                        record.direction,
                        record.result,
                        record.pnl
                    );
                }
                Ok(BotEvent::SessionStopped { reason }) => {
                    tracing::warn!("Session stopped: {}", reason);
                }
                Ok(BotEvent::StrategySwitched { from, to }) => {
                    tracing::info!("🔀 Strategy switched {} -> {}", from, to);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("Event logger lagged by {} events", missed);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn run_backtest(
    path: Option<&str>,
    strategy: Option<StrategyKind>,
    candles: usize,
    seed: u64,
    scenario: MarketScenario,
    balance: f64,
) -> Result<()> {
    let mut trading = match path {
        Some(_) => load_config(path)?.trading,
        None => optionbot::config::TradeConfig::default(),
    };
    if let Some(kind) = strategy {
        trading.strategy = kind;
    }

    let symbol = trading
        .symbols
        .first()
        .cloned()
        .unwrap_or_else(|| optionbot::config::DEFAULT_SYMBOL.to_string());
    let timeframe = trading.candle_timeframe_secs;

    let mut generator = SyntheticDataGenerator::new(seed);
    let series = generator.generate(scenario, &symbol, candles, timeframe);

    let runner = BacktestRunner::new(trading, balance);
    runner
        .run_and_report(&series, &format!("{} (seed {})", scenario, seed))
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
