use optionbot::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use optionbot::config::{TradeConfig, DEFAULT_SYMBOL};
use optionbot::strategy::StrategyKind;
use optionbot::Result;

const CANDLES: usize = 1000;
const SEED: u64 = 42;
const INITIAL_BALANCE: f64 = 1000.0;

/// Every strategy against every synthetic scenario
fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("optionbot=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          OPTIONBOT STRATEGY / SCENARIO MATRIX         ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let strategies = [
        StrategyKind::RsiThreshold,
        StrategyKind::TrendFollow,
        StrategyKind::MeanReversion,
        StrategyKind::Grid,
    ];

    let mut results = Vec::new();

    for scenario in MarketScenario::ALL {
        // Same series for every strategy
        let mut generator = SyntheticDataGenerator::new(SEED);
        let candles = generator.generate(scenario, DEFAULT_SYMBOL, CANDLES, 60);

        for strategy in strategies {
            let config = TradeConfig {
                strategy,
                ..TradeConfig::default()
            };
            let runner = BacktestRunner::new(config, INITIAL_BALANCE);

            match runner.run(&candles) {
                Ok(metrics) => results.push((scenario, strategy, metrics)),
                Err(e) => eprintln!("❌ Backtest failed for {} / {}: {}", scenario, strategy, e),
            }
        }
    }

    print_matrix(&results);

    Ok(())
}

fn print_matrix(results: &[(MarketScenario, StrategyKind, BacktestMetrics)]) {
    println!(
        "\n{:<12} {:<16} {:>10} {:>8} {:>8} {:>8} {:>6}",
        "Scenario", "Strategy", "P&L", "Trades", "Win%", "MaxDD%", "Stop"
    );
    println!("{}", "─".repeat(74));

    for (scenario, strategy, metrics) in results {
        println!(
            "{:<12} {:<16} {:>10.2} {:>8} {:>8.1} {:>8.2} {:>6}",
            scenario.as_str(),
            strategy.as_str(),
            metrics.total_pnl,
            metrics.total_trades,
            metrics.win_rate,
            metrics.max_drawdown_pct,
            if metrics.stopped_early { "yes" } else { "" }
        );
    }

    let best = results.iter().max_by(|a, b| a.2.total_pnl.total_cmp(&b.2.total_pnl));
    if let Some((scenario, strategy, metrics)) = best {
        println!(
            "\n🏆 Best: {} on {} ({:+.2})",
            strategy, scenario, metrics.total_pnl
        );
    }

    let total_trades: usize = results.iter().map(|(_, _, m)| m.total_trades).sum();
    println!("📊 Total trades across all runs: {}", total_trades);
    println!("\n═══════════════════════════════════════════════════════\n");
}
