//! polymarket_bot - Main Entry Point
//!
//! Runs the polling trading loop against Polymarket until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use polymarket_bot::common::channels::create_price_channel;
use polymarket_bot::config::{load_config, load_from_env, AppConfig, StrategyConfig};
use polymarket_bot::engine::{CycleOrchestrator, ExecutionGate};
use polymarket_bot::polymarket::{OrderGatewayClient, PolymarketClient, PriceFeed};
use polymarket_bot::position::{JsonFileStore, PaperLedger, PositionBook};
use polymarket_bot::strategy::StrategyRegistry;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Ignore the config file and read the flat DRY_RUN / CHECK_INTERVAL / HCC_* variables
    #[arg(long)]
    env_only: bool,

    /// Force dry-run mode
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,

    /// Submit real orders
    #[arg(long)]
    live: bool,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Print paper-trading stats and open positions, then exit
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config = if args.env_only {
        load_from_env()
    } else {
        load_config(Some(args.config.as_str()))
    }
    .context("failed to load configuration")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_tracing(&level, args.json_logs);

    if args.report {
        return report(&config);
    }

    if args.live {
        config.bot.dry_run = false;
    } else if args.dry_run {
        config.bot.dry_run = true;
    }
    if config.strategies.is_empty() {
        info!("No strategies configured, using the BTC 15-minute defaults");
        config.strategies = StrategyConfig::btc_15min_defaults();
    }

    for warning in config.validate()? {
        warn!("{}", warning);
    }

    info!("Starting polymarket_bot");
    info!("Configuration file: {}", args.config);

    let mut orchestrator = build_orchestrator(&config)?;
    if let Some(cycles) = args.cycles {
        orchestrator = orchestrator.with_max_cycles(cycles);
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current cycle...");
            let _ = stop_tx.send(true);
        }
    });

    orchestrator.run(stop_rx).await?;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_orchestrator(config: &AppConfig) -> Result<CycleOrchestrator> {
    let timeout = Duration::from_secs(config.settings.request_timeout_seconds);

    let source = PolymarketClient::new(&config.polymarket, config.bot.scope.clone(), timeout)?;
    let strategies = StrategyRegistry::from_config(&config.strategies);
    let book = PositionBook::load(Box::new(JsonFileStore::new(config.bot.positions_path.clone())))?;

    let gate = if config.bot.dry_run {
        ExecutionGate::DryRun
    } else {
        let credentials = config
            .polymarket
            .credentials()
            .context("live trading requires API credentials")?;
        ExecutionGate::live(Arc::new(OrderGatewayClient::new(
            &config.polymarket.order_url,
            credentials,
            timeout,
        )?))
    };

    let mut orchestrator = CycleOrchestrator::new(Arc::new(source), strategies, book, gate)
        .with_poll_interval(Duration::from_secs(config.bot.poll_interval_seconds))
        .with_price_staleness(chrono::Duration::seconds(
            config.bot.price_staleness_seconds as i64,
        ));

    if config.bot.dry_run {
        let ledger = PaperLedger::load(Box::new(JsonFileStore::new(
            config.bot.paper_trades_path.clone(),
        )))?;
        orchestrator = orchestrator.with_ledger(ledger);
    }

    if config.bot.use_websocket {
        let (tx, rx) = create_price_channel();
        let feed = PriceFeed::new(&config.polymarket.websocket_url, &config.settings);
        info!("Price feed enabled: {}", feed.url());
        orchestrator = orchestrator
            .with_price_hints(rx)
            .with_price_feed(feed.spawn(tx));
    }

    Ok(orchestrator)
}

fn report(config: &AppConfig) -> Result<()> {
    let ledger = PaperLedger::load(Box::new(JsonFileStore::new(
        config.bot.paper_trades_path.clone(),
    )))?;
    ledger.log_stats();

    let book = PositionBook::load(Box::new(JsonFileStore::new(config.bot.positions_path.clone())))?;
    for position in book.open_positions() {
        info!(
            market_id = %position.market_id,
            strategy = %position.strategy,
            "{} {} shares @ ${:.3} (unrealized ${:+.2}): {}",
            position.side,
            position.quantity,
            position.avg_entry_price,
            position.unrealized_pnl,
            position.question
        );
    }
    info!(
        "Open positions: {}, exposure ${:.2}, unrealized ${:+.2}, realized ${:+.2}",
        book.open_positions().len(),
        book.total_exposure(),
        book.unrealized_pnl(),
        book.realized_pnl()
    );
    Ok(())
}
