//! End-to-end cycles through fetch, evaluate, dedup, execute and persist

mod common;

use chrono::{Duration, Utc};
use polymarket_bot::common::channels::create_price_channel;
use polymarket_bot::common::errors::BotError;
use polymarket_bot::common::types::{PriceUpdate, Side};
use polymarket_bot::engine::{CycleOrchestrator, CycleState, ExecutionGate};
use polymarket_bot::position::{BookDocument, LedgerDocument, MemoryStore, PaperLedger, PositionBook};
use polymarket_bot::strategy::StrategyRegistry;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::watch;

use common::{price_arbitrage, snapshot, FakeMarketSource, PoisonedStrategy, RecordingExecutor};

struct Harness {
    source: Arc<FakeMarketSource>,
    book_store: MemoryStore<BookDocument>,
    ledger_store: MemoryStore<LedgerDocument>,
    orchestrator: CycleOrchestrator,
}

fn dry_run_harness(source: FakeMarketSource) -> Harness {
    let source = Arc::new(source);
    let book_store = MemoryStore::new();
    let ledger_store = MemoryStore::new();
    let orchestrator = CycleOrchestrator::new(
        source.clone(),
        StrategyRegistry::new(vec![price_arbitrage(dec!(0.01), 10)]),
        PositionBook::new(Box::new(book_store.clone())),
        ExecutionGate::DryRun,
    )
    .with_ledger(PaperLedger::new(Box::new(ledger_store.clone())));

    Harness {
        source,
        book_store,
        ledger_store,
        orchestrator,
    }
}

#[test_log::test(tokio::test)]
async fn test_arbitrage_opens_once_across_cycles() {
    let now = Utc::now();
    let mut h = dry_run_harness(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));

    let first = h.orchestrator.run_cycle_at(now).await.unwrap();
    assert_eq!(first.proposed, 1);
    assert_eq!(first.accepted, 1);
    assert_eq!(first.executed, 1);
    assert_eq!(h.orchestrator.state(), CycleState::Sleeping);

    let position = h.orchestrator.book().open_position("M", Side::Yes).unwrap();
    assert_eq!(position.quantity, 10);
    assert_eq!(position.avg_entry_price, dec!(0.48));
    assert_eq!(position.strategy, "PriceArbitrage");

    let second = h
        .orchestrator
        .run_cycle_at(now + Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(second.proposed, 1);
    assert_eq!(second.accepted, 0);
    assert_eq!(second.rejected, 1);
    assert_eq!(h.orchestrator.book().open_positions().len(), 1);

    // One paper trade, flushed in the first cycle's persisting stage
    let ledger = h.ledger_store.snapshot().unwrap();
    assert_eq!(ledger.trades.len(), 1);
    assert_eq!(ledger.trades[0].entry_price, dec!(0.48));
    assert_eq!(h.orchestrator.stats().trades, 1);
    assert!(h.book_store.snapshot().is_some());
}

#[tokio::test]
async fn test_failing_strategy_does_not_block_others() {
    let now = Utc::now();
    let source = Arc::new(FakeMarketSource::with_snapshots(vec![
        snapshot("M", dec!(0.48), dec!(0.48), now, Duration::minutes(15)),
        snapshot("BAD", dec!(0.50), dec!(0.50), now, Duration::minutes(15)),
    ]));
    let mut orchestrator = CycleOrchestrator::new(
        source,
        StrategyRegistry::new(vec![
            Box::new(PoisonedStrategy {
                poison_market: "BAD".to_string(),
            }),
            price_arbitrage(dec!(0.01), 10),
        ]),
        PositionBook::new(Box::new(MemoryStore::new())),
        ExecutionGate::DryRun,
    );

    let report = orchestrator.run_cycle_at(now).await.unwrap();
    assert_eq!(report.strategy_errors, 1);
    assert_eq!(report.executed, 1);
    assert!(orchestrator.book().has_open("M", Side::Yes));
}

#[tokio::test]
async fn test_out_of_range_price_does_not_stop_the_loop() {
    let now = Utc::now();
    let mut h = dry_run_harness(FakeMarketSource::with_snapshots(vec![
        snapshot("BAD", dec!(1.05), dec!(-0.10), now, Duration::minutes(15)),
        snapshot("M", dec!(0.48), dec!(0.48), now, Duration::minutes(15)),
    ]));
    h.orchestrator = h
        .orchestrator
        .with_poll_interval(std::time::Duration::from_millis(1))
        .with_max_cycles(3);

    let (_stop_tx, stop_rx) = watch::channel(false);
    h.orchestrator.run(stop_rx).await.unwrap();

    assert_eq!(h.orchestrator.stats().cycles, 3);
    assert!(h.orchestrator.book().has_open("M", Side::Yes));
    assert!(h.orchestrator.book().positions_for("BAD").is_empty());
    assert_eq!(h.orchestrator.stats().trades, 1);
}

#[tokio::test]
async fn test_unfillable_intent_is_never_sent_live() {
    let now = Utc::now();
    let executor = Arc::new(RecordingExecutor::default());
    let mut orchestrator = CycleOrchestrator::new(
        Arc::new(FakeMarketSource::with_snapshots(vec![
            snapshot("BAD", dec!(1.05), dec!(-0.10), now, Duration::minutes(15)),
            snapshot("M", dec!(0.48), dec!(0.48), now, Duration::minutes(15)),
        ])),
        StrategyRegistry::new(vec![price_arbitrage(dec!(0.01), 10)]),
        PositionBook::new(Box::new(MemoryStore::new())),
        ExecutionGate::live(executor.clone()),
    );

    let report = orchestrator.run_cycle_at(now).await.unwrap();
    assert_eq!(report.failed_orders, 1);
    assert_eq!(report.executed, 1);

    let sent: Vec<String> = executor.submitted().iter().map(|i| i.market_id.clone()).collect();
    assert_eq!(sent, vec!["M".to_string()]);
}

#[tokio::test]
async fn test_fetch_failure_aborts_cycle_then_recovers() {
    let now = Utc::now();
    let mut h = dry_run_harness(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));
    h.source.set_failing(true);

    let aborted = h.orchestrator.run_cycle_at(now).await.unwrap();
    assert!(aborted.fetch_failed);
    assert_eq!(aborted.proposed, 0);
    assert_eq!(h.orchestrator.state(), CycleState::Sleeping);
    assert!(h.orchestrator.book().open_positions().is_empty());
    assert_eq!(h.book_store.save_count(), 0);

    h.source.set_failing(false);
    let recovered = h.orchestrator.run_cycle_at(now).await.unwrap();
    assert!(!recovered.fetch_failed);
    assert_eq!(recovered.executed, 1);
    assert_eq!(h.orchestrator.stats().cycles, 2);
    assert_eq!(h.orchestrator.stats().aborted_cycles, 1);
}

#[tokio::test]
async fn test_failed_order_leaves_book_untouched() {
    let now = Utc::now();
    let source = Arc::new(FakeMarketSource::with_snapshots(vec![
        snapshot("A", dec!(0.45), dec!(0.50), now, Duration::minutes(15)),
        snapshot("B", dec!(0.50), dec!(0.45), now, Duration::minutes(15)),
    ]));
    let executor = Arc::new(RecordingExecutor::default());
    executor.reject_market("A");

    let mut orchestrator = CycleOrchestrator::new(
        source,
        StrategyRegistry::new(vec![price_arbitrage(dec!(0.01), 10)]),
        PositionBook::new(Box::new(MemoryStore::new())),
        ExecutionGate::live(executor.clone()),
    );

    let report = orchestrator.run_cycle_at(now).await.unwrap();
    assert_eq!(report.accepted, 2);
    assert_eq!(report.failed_orders, 1);
    assert_eq!(report.executed, 1);
    assert!(!orchestrator.book().has_open("A", Side::Yes));
    assert!(orchestrator.book().has_open("B", Side::No));

    // The failed market is retried next cycle; the filled one is not
    let retry = orchestrator.run_cycle_at(now).await.unwrap();
    assert_eq!(retry.accepted, 1);
    assert_eq!(retry.rejected, 1);
    assert_eq!(executor.submitted().len(), 3);
}

#[tokio::test]
async fn test_persistence_failure_is_fatal() {
    let now = Utc::now();
    let source = Arc::new(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));
    let book_store = MemoryStore::new();
    book_store.set_failing(true);

    let mut orchestrator = CycleOrchestrator::new(
        source,
        StrategyRegistry::new(vec![price_arbitrage(dec!(0.01), 10)]),
        PositionBook::new(Box::new(book_store)),
        ExecutionGate::DryRun,
    )
    .with_poll_interval(std::time::Duration::from_millis(1))
    .with_max_cycles(5);

    let (_stop_tx, stop_rx) = watch::channel(false);
    let err = orchestrator.run(stop_rx).await.unwrap_err();
    assert!(matches!(err, BotError::Persistence(_)));
    assert_eq!(orchestrator.stats().cycles, 0);
}

#[tokio::test]
async fn test_ledger_flush_failure_is_fatal() {
    let now = Utc::now();
    let h = dry_run_harness(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));
    let mut orchestrator = h.orchestrator;
    h.ledger_store.set_failing(true);

    let err = orchestrator.run_cycle_at(now).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(orchestrator.state(), CycleState::Persisting);
}

#[tokio::test]
async fn test_closed_market_settles_once_resolved() {
    let now = Utc::now();
    let mut h = dry_run_harness(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));
    h.orchestrator.run_cycle_at(now).await.unwrap();
    h.source.set_snapshots(Vec::new());

    // Closed but not yet resolved: asked for, kept open
    let later = now + Duration::minutes(16);
    let pending = h.orchestrator.run_cycle_at(later).await.unwrap();
    assert_eq!(pending.settled_positions, 0);
    assert_eq!(h.source.resolution_requests(), vec!["M".to_string()]);
    assert!(h.orchestrator.book().has_open("M", Side::Yes));

    h.source.resolve("M", Side::Yes);
    let settled = h
        .orchestrator
        .run_cycle_at(later + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(settled.settled_positions, 1);
    assert!(h.orchestrator.book().open_positions().is_empty());
    assert_eq!(h.orchestrator.book().realized_pnl(), dec!(5.20));

    let stats = h.orchestrator.ledger().unwrap().stats();
    assert_eq!(stats.resolved_trades, 1);
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.total_pnl, dec!(5.20));
    assert_eq!(h.ledger_store.snapshot().unwrap().resolutions.len(), 1);

    // Nothing left to ask about
    h.orchestrator
        .run_cycle_at(later + Duration::minutes(2))
        .await
        .unwrap();
    assert_eq!(h.source.resolution_requests().len(), 2);
}

#[tokio::test]
async fn test_fresh_websocket_price_overrides_snapshot_for_marking() {
    let now = Utc::now();
    let (tx, rx) = create_price_channel();
    let mut h = dry_run_harness(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));
    let mut orchestrator = h
        .orchestrator
        .with_price_hints(rx)
        .with_price_staleness(Duration::seconds(30));

    orchestrator.run_cycle_at(now).await.unwrap();

    tx.send(PriceUpdate {
        market_id: "M".to_string(),
        side: Side::Yes,
        price: dec!(0.60),
        received_at: now + Duration::seconds(1),
    })
    .await
    .unwrap();

    orchestrator
        .run_cycle_at(now + Duration::seconds(2))
        .await
        .unwrap();
    let position = orchestrator.book().open_position("M", Side::Yes).unwrap();
    assert_eq!(position.mark_price, Some(dec!(0.60)));
    assert_eq!(position.unrealized_pnl, dec!(1.20));

    // Once the hint is stale the REST price is used again
    orchestrator
        .run_cycle_at(now + Duration::minutes(2))
        .await
        .unwrap();
    let position = orchestrator.book().open_position("M", Side::Yes).unwrap();
    assert_eq!(position.mark_price, Some(dec!(0.48)));
    assert_eq!(position.unrealized_pnl, dec!(0));

    h.orchestrator = orchestrator;
    assert_eq!(h.orchestrator.price_cache().len(), 1);
}

#[tokio::test]
async fn test_stop_signal_interrupts_sleep() {
    let now = Utc::now();
    let h = dry_run_harness(FakeMarketSource::with_snapshots(vec![snapshot(
        "M",
        dec!(0.48),
        dec!(0.48),
        now,
        Duration::minutes(15),
    )]));
    let mut orchestrator = h
        .orchestrator
        .with_poll_interval(std::time::Duration::from_secs(3600));

    let (stop_tx, stop_rx) = watch::channel(false);
    let stopper = async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
    };

    let (result, _) = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        async { tokio::join!(orchestrator.run(stop_rx), stopper) },
    )
    .await
    .expect("run did not stop");

    result.unwrap();
    assert_eq!(orchestrator.stats().cycles, 1);
    assert_eq!(orchestrator.state(), CycleState::Idle);
}
