//! The fixed-interval trading cycle
//!
//! Each cycle walks Idle → Fetching → Evaluating → Executing → Persisting →
//! Sleeping. A failed fetch skips straight to Sleeping; strategy and order
//! failures are isolated to the strategy or intent that caused them. A
//! persistence failure stops the loop.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::execution::{ExecutionGate, ExecutionOutcome};
use super::price_cache::LatestPriceCache;
use crate::common::errors::Result;
use crate::common::traits::MarketDataSource;
use crate::common::types::{MarketSnapshot, PriceUpdate, Side, TradeIntent};
use crate::polymarket::PriceFeedHandle;
use crate::position::{Admission, Deduplicator, Fill, PaperLedger, PositionBook};
use crate::strategy::{EvaluationContext, StrategyRegistry};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_PRICE_STALENESS_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Evaluating,
    Executing,
    Persisting,
    Sleeping,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Evaluating => "evaluating",
            CycleState::Executing => "executing",
            CycleState::Persisting => "persisting",
            CycleState::Sleeping => "sleeping",
        };
        write!(f, "{}", name)
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub snapshots: usize,
    pub proposed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub executed: usize,
    pub failed_orders: usize,
    pub strategy_errors: usize,
    pub settled_positions: usize,
    pub fetch_failed: bool,
}

/// Running totals across cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub aborted_cycles: u64,
    pub trades: u64,
    pub settled_positions: u64,
}

impl CycleStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.fetch_failed {
            self.aborted_cycles += 1;
        }
        self.trades += report.executed as u64;
        self.settled_positions += report.settled_positions as u64;
    }
}

/// Drives fetch → evaluate → dedup → execute → persist → sleep
///
/// Owns the position book; nothing else writes to it.
pub struct CycleOrchestrator {
    source: Arc<dyn MarketDataSource>,
    strategies: StrategyRegistry,
    dedup: Deduplicator,
    book: PositionBook,
    gate: ExecutionGate,
    ledger: Option<PaperLedger>,
    price_rx: Option<mpsc::Receiver<PriceUpdate>>,
    price_feed: Option<PriceFeedHandle>,
    price_cache: LatestPriceCache,
    tracked_markets: HashSet<String>,
    poll_interval: Duration,
    price_staleness: chrono::Duration,
    previous: HashMap<String, MarketSnapshot>,
    max_cycles: Option<u64>,
    state: CycleState,
    stats: CycleStats,
}

impl CycleOrchestrator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        strategies: StrategyRegistry,
        book: PositionBook,
        gate: ExecutionGate,
    ) -> Self {
        Self {
            source,
            strategies,
            dedup: Deduplicator::new(),
            book,
            gate,
            ledger: None,
            price_rx: None,
            price_feed: None,
            price_cache: LatestPriceCache::new(),
            tracked_markets: HashSet::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            price_staleness: chrono::Duration::seconds(DEFAULT_PRICE_STALENESS_SECONDS),
            previous: HashMap::new(),
            max_cycles: None,
            state: CycleState::Idle,
            stats: CycleStats::default(),
        }
    }

    /// Record simulated fills in a paper ledger
    pub fn with_ledger(mut self, ledger: PaperLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Consult WebSocket price hints arriving on `rx`
    pub fn with_price_hints(mut self, rx: mpsc::Receiver<PriceUpdate>) -> Self {
        self.price_rx = Some(rx);
        self
    }

    /// Register tokens of held markets with a running price feed
    pub fn with_price_feed(mut self, handle: PriceFeedHandle) -> Self {
        self.price_feed = Some(handle);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_price_staleness(mut self, staleness: chrono::Duration) -> Self {
        self.price_staleness = staleness;
        self
    }

    /// Stop after `cycles` cycles
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn ledger(&self) -> Option<&PaperLedger> {
        self.ledger.as_ref()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn price_cache(&self) -> &LatestPriceCache {
        &self.price_cache
    }

    /// Loop until `stop` is set or the cycle limit is reached
    ///
    /// Returns `Err` only for fatal errors.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<()> {
        info!(
            strategies = ?self.strategies.names(),
            dry_run = self.gate.is_dry_run(),
            "Starting trading loop (every {}s)",
            self.poll_interval.as_secs()
        );

        let result = loop {
            if *stop.borrow() {
                info!("Stop requested");
                break Ok(());
            }

            if let Err(e) = self.run_cycle().await {
                error!(stage = %self.state, error = %e, "Fatal error, stopping");
                break Err(e);
            }

            if self.max_cycles.is_some_and(|max| self.stats.cycles >= max) {
                info!("Reached cycle limit ({})", self.stats.cycles);
                break Ok(());
            }

            self.state = CycleState::Sleeping;
            if self.sleep_or_stop(&mut stop).await {
                info!("Stop requested");
                break Ok(());
            }
        };

        self.shutdown();
        result
    }

    /// Sleep for the poll interval; true if stop was requested meanwhile
    async fn sleep_or_stop(&self, stop: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => false,
            changed = stop.changed() => match changed {
                Ok(()) => *stop.borrow(),
                Err(_) => {
                    // Sender gone; nobody can stop us early any more
                    tokio::time::sleep(self.poll_interval).await;
                    false
                }
            },
        }
    }

    fn shutdown(&mut self) {
        self.state = CycleState::Idle;
        if let Some(feed) = self.price_feed.take() {
            feed.shutdown();
        }
        if let Some(ledger) = &self.ledger {
            ledger.log_stats();
        }
        info!(
            cycles = self.stats.cycles,
            aborted = self.stats.aborted_cycles,
            trades = self.stats.trades,
            "Trading loop stopped"
        );
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One full cycle evaluated at `now`
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport {
            cycle: self.stats.cycles + 1,
            ..CycleReport::default()
        };
        info!(cycle = report.cycle, "Cycle started");

        // Fetching
        self.state = CycleState::Fetching;
        let snapshots = match self.source.fetch_active_markets().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(stage = "fetching", error = %e, transient = e.is_transient(), "Market fetch failed, skipping cycle");
                report.fetch_failed = true;
                self.state = CycleState::Sleeping;
                self.stats.record(&report);
                return Ok(report);
            }
        };
        report.snapshots = snapshots.len();

        if let Some(rx) = self.price_rx.as_mut() {
            self.price_cache.drain(rx);
        }
        let resolutions = self.fetch_resolutions(now).await;

        // Evaluating
        self.state = CycleState::Evaluating;
        let previous = std::mem::take(&mut self.previous);
        let ctx = EvaluationContext::new(now).with_previous(previous);
        let evaluation = self.strategies.evaluate_all(&snapshots, &ctx);
        report.proposed = evaluation.intents.len();
        report.strategy_errors = evaluation.errors.len();

        // Executing
        self.state = CycleState::Executing;
        for (market_id, winner) in resolutions {
            report.settled_positions += self.settle(&market_id, winner, now)?;
        }
        self.mark_to_market(&snapshots, now)?;
        for intent in &evaluation.intents {
            self.admit_and_execute(intent, now, &mut report).await?;
        }
        self.track_held_markets(&snapshots);

        // Persisting
        self.state = CycleState::Persisting;
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.flush()?;
        }

        self.previous = snapshots
            .into_iter()
            .map(|s| (s.market_id.clone(), s))
            .collect();
        self.state = CycleState::Sleeping;
        self.stats.record(&report);

        info!(
            cycle = report.cycle,
            snapshots = report.snapshots,
            proposed = report.proposed,
            accepted = report.accepted,
            rejected = report.rejected,
            executed = report.executed,
            failed_orders = report.failed_orders,
            strategy_errors = report.strategy_errors,
            settled = report.settled_positions,
            "Cycle complete: {} open positions, exposure ${:.2}, unrealized P/L ${:+.2}",
            self.book.open_positions().len(),
            self.book.total_exposure(),
            self.book.unrealized_pnl()
        );
        Ok(report)
    }

    /// Winning sides of held (and paper-traded) markets past their close time
    ///
    /// Lookup failures are logged and retried next cycle.
    async fn fetch_resolutions(&self, now: DateTime<Utc>) -> BTreeMap<String, Side> {
        let mut due: Vec<String> = self.book.markets_due_for_settlement(now);
        if let Some(ledger) = &self.ledger {
            for trade in ledger.pending_trades() {
                if trade.close_time <= now && !due.contains(&trade.market_id) {
                    due.push(trade.market_id.clone());
                }
            }
        }

        let mut resolutions = BTreeMap::new();
        for market_id in due {
            match self.source.fetch_resolution(&market_id).await {
                Ok(Some(winner)) => {
                    debug!(market_id = %market_id, winner = %winner, "Resolution found");
                    resolutions.insert(market_id, winner);
                }
                Ok(None) => debug!(market_id = %market_id, "Market closed but not yet resolved"),
                Err(e) => warn!(market_id = %market_id, stage = "fetching", error = %e, "Resolution lookup failed"),
            }
        }
        resolutions
    }

    fn settle(&mut self, market_id: &str, winner: Side, now: DateTime<Utc>) -> Result<usize> {
        let settled = self.book.settle(market_id, winner, now)?;
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.resolve(market_id, winner, now);
        }
        self.price_cache.forget(market_id);
        if self.tracked_markets.remove(market_id) {
            if let Some(feed) = &self.price_feed {
                feed.untrack(vec![market_id.to_string()]);
            }
        }
        Ok(settled.len())
    }

    /// Revalue held markets, preferring fresh WebSocket prices over the snapshot
    fn mark_to_market(&mut self, snapshots: &[MarketSnapshot], now: DateTime<Utc>) -> Result<()> {
        for snapshot in snapshots {
            if self.book.positions_for(&snapshot.market_id).is_empty() {
                continue;
            }
            let yes = self
                .price_cache
                .fresh(&snapshot.market_id, Side::Yes, now, self.price_staleness)
                .or(snapshot.yes_price);
            let no = self
                .price_cache
                .fresh(&snapshot.market_id, Side::No, now, self.price_staleness)
                .or(snapshot.no_price);
            self.book.mark_to_market(&snapshot.market_id, yes, no)?;
        }
        Ok(())
    }

    async fn admit_and_execute(
        &mut self,
        intent: &TradeIntent,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<()> {
        if let Admission::Reject(reason) = self.dedup.admit(intent, &self.book, now) {
            debug!(
                market_id = %intent.market_id,
                strategy = %intent.strategy,
                side = %intent.side,
                "Intent rejected: {}",
                reason
            );
            report.rejected += 1;
            return Ok(());
        }
        let fill = Fill::from_intent(intent, now);
        if let Err(e) = fill.validate() {
            warn!(
                market_id = %intent.market_id,
                strategy = %intent.strategy,
                stage = "executing",
                error = %e,
                "Intent not executable"
            );
            report.failed_orders += 1;
            return Ok(());
        }
        report.accepted += 1;

        match self.gate.execute(intent).await {
            ExecutionOutcome::Filled { .. } => {
                match self.book.open_or_accumulate(fill) {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        error!(
                            market_id = %intent.market_id,
                            strategy = %intent.strategy,
                            stage = "executing",
                            error = %e,
                            "Fill not recorded"
                        );
                        report.failed_orders += 1;
                        return Ok(());
                    }
                }
                if self.gate.is_dry_run() {
                    if let Some(ledger) = self.ledger.as_mut() {
                        ledger.record(intent, now);
                    }
                }
                report.executed += 1;
            }
            ExecutionOutcome::Failed(_) => report.failed_orders += 1,
        }
        Ok(())
    }

    /// Ask the price feed for the tokens of newly held markets
    fn track_held_markets(&mut self, snapshots: &[MarketSnapshot]) {
        let Some(feed) = &self.price_feed else {
            return;
        };
        let mut tokens = Vec::new();
        for snapshot in snapshots {
            if self.tracked_markets.contains(&snapshot.market_id)
                || !self
                    .book
                    .positions_for(&snapshot.market_id)
                    .iter()
                    .any(|p| p.is_open())
            {
                continue;
            }
            self.tracked_markets.insert(snapshot.market_id.clone());
            tokens.extend(snapshot.tokens());
        }
        feed.track(tokens);
    }
}
