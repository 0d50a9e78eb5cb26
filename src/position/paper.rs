//! Paper-trade ledger for dry-run performance statistics

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::store::Store;
use crate::common::errors::Result;
use crate::common::types::{Side, TradeIntent};

/// One simulated fill; never modified once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperTradeRecord {
    /// `market:side:timestamp`
    pub trade_id: String,
    pub market_id: String,
    pub question: String,
    pub side: Side,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub strategy: String,
    pub reason: String,
    pub volume: Decimal,
    pub close_time: DateTime<Utc>,
}

impl PaperTradeRecord {
    pub fn from_intent(intent: &TradeIntent, at: DateTime<Utc>) -> Self {
        Self {
            trade_id: format!("{}:{}:{}", intent.market_id, intent.side, at.to_rfc3339()),
            market_id: intent.market_id.clone(),
            question: intent.question.clone(),
            side: intent.side,
            quantity: intent.quantity,
            entry_price: intent.price,
            entry_time: at,
            strategy: intent.strategy.clone(),
            reason: intent.reason.clone(),
            volume: intent.volume,
            close_time: intent.close_time,
        }
    }

    pub fn cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.entry_price
    }

    /// P/L once the market resolved to `winner`
    pub fn pnl(&self, winner: Side) -> Decimal {
        if self.side == winner {
            Decimal::from(self.quantity) - self.cost()
        } else {
            -self.cost()
        }
    }
}

/// Winning side of a market, recorded once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketResolution {
    pub market_id: String,
    pub winning_side: Side,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub trades: Vec<PaperTradeRecord>,
    #[serde(default)]
    pub resolutions: Vec<MarketResolution>,
}

/// Aggregate performance of the paper trades
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaperStats {
    pub total_trades: usize,
    pub resolved_trades: usize,
    pub pending_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage of resolved trades with positive P/L
    pub win_rate: Decimal,
    pub total_invested: Decimal,
    pub total_pnl: Decimal,
    /// Total P/L as a percentage of total invested
    pub roi: Decimal,
}

/// Append-only ledger of paper trades and market resolutions
///
/// Appends are buffered until [`PaperLedger::flush`].
pub struct PaperLedger {
    document: LedgerDocument,
    store: Box<dyn Store<LedgerDocument>>,
    dirty: bool,
}

impl PaperLedger {
    pub fn new(store: Box<dyn Store<LedgerDocument>>) -> Self {
        Self {
            document: LedgerDocument::default(),
            store,
            dirty: false,
        }
    }

    pub fn load(store: Box<dyn Store<LedgerDocument>>) -> Result<Self> {
        let document = store.load()?.unwrap_or_default();
        info!(
            "Loaded {} paper trades ({} markets resolved)",
            document.trades.len(),
            document.resolutions.len()
        );
        Ok(Self {
            document,
            store,
            dirty: false,
        })
    }

    /// Append a simulated fill
    pub fn record(&mut self, intent: &TradeIntent, at: DateTime<Utc>) -> &PaperTradeRecord {
        let record = PaperTradeRecord::from_intent(intent, at);
        info!(
            trade_id = %record.trade_id,
            "Paper trade recorded: {} {} shares @ ${:.3}",
            record.side,
            record.quantity,
            record.entry_price
        );
        self.document.trades.push(record);
        self.dirty = true;
        &self.document.trades[self.document.trades.len() - 1]
    }

    /// Record a market's winning side; returns false if it was already resolved
    pub fn resolve(&mut self, market_id: &str, winner: Side, at: DateTime<Utc>) -> bool {
        if self.resolution(market_id).is_some() {
            return false;
        }
        self.document.resolutions.push(MarketResolution {
            market_id: market_id.to_string(),
            winning_side: winner,
            resolved_at: at,
        });
        self.dirty = true;
        true
    }

    pub fn resolution(&self, market_id: &str) -> Option<&MarketResolution> {
        self.document
            .resolutions
            .iter()
            .find(|r| r.market_id == market_id)
    }

    pub fn trades(&self) -> &[PaperTradeRecord] {
        &self.document.trades
    }

    pub fn pending_trades(&self) -> Vec<&PaperTradeRecord> {
        self.document
            .trades
            .iter()
            .filter(|t| self.resolution(&t.market_id).is_none())
            .collect()
    }

    pub fn has_unflushed(&self) -> bool {
        self.dirty
    }

    /// Save buffered appends; a failure leaves them buffered
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&self.document)?;
        self.dirty = false;
        Ok(())
    }

    pub fn stats(&self) -> PaperStats {
        let winners: HashMap<&str, Side> = self
            .document
            .resolutions
            .iter()
            .map(|r| (r.market_id.as_str(), r.winning_side))
            .collect();

        let mut stats = PaperStats {
            total_trades: self.document.trades.len(),
            ..PaperStats::default()
        };

        for trade in &self.document.trades {
            stats.total_invested += trade.cost();
            match winners.get(trade.market_id.as_str()) {
                Some(winner) => {
                    let pnl = trade.pnl(*winner);
                    stats.resolved_trades += 1;
                    stats.total_pnl += pnl;
                    if pnl > Decimal::ZERO {
                        stats.wins += 1;
                    } else {
                        stats.losses += 1;
                    }
                }
                None => stats.pending_trades += 1,
            }
        }

        if stats.resolved_trades > 0 {
            stats.win_rate =
                Decimal::from(stats.wins * 100) / Decimal::from(stats.resolved_trades);
        }
        if stats.total_invested > Decimal::ZERO {
            stats.roi = stats.total_pnl / stats.total_invested * Decimal::ONE_HUNDRED;
        }
        stats
    }

    /// Log the stats block
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!("============================================================");
        info!("PAPER TRADING PERFORMANCE");
        info!("Total Trades: {}", stats.total_trades);
        info!("  - Resolved: {}", stats.resolved_trades);
        info!("  - Pending: {}", stats.pending_trades);
        info!("Win Rate: {:.1}%", stats.win_rate);
        info!("  - Wins: {}", stats.wins);
        info!("  - Losses: {}", stats.losses);
        info!("Total Invested: ${:.2}", stats.total_invested);
        info!("Total P/L: ${:+.2}", stats.total_pnl);
        info!("ROI: {:+.1}%", stats.roi);
        info!("============================================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::store::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn intent(market: &str, side: Side, quantity: u64, price: Decimal) -> TradeIntent {
        TradeIntent {
            market_id: market.to_string(),
            question: "BTC up?".to_string(),
            side,
            quantity,
            price,
            strategy: "MeanReversion".to_string(),
            reason: "extreme".to_string(),
            close_time: Utc::now() + Duration::minutes(15),
            volume: dec!(100),
            token_id: None,
        }
    }

    #[test]
    fn test_record_is_buffered_until_flush() {
        let store = MemoryStore::new();
        let mut ledger = PaperLedger::new(Box::new(store.clone()));

        let id = ledger.record(&intent("m1", Side::Yes, 10, dec!(0.40)), Utc::now()).trade_id.clone();
        assert!(id.starts_with("m1:YES:"));
        assert!(ledger.has_unflushed());
        assert_eq!(store.save_count(), 0);

        ledger.flush().unwrap();
        assert!(!ledger.has_unflushed());
        assert_eq!(store.snapshot().unwrap().trades.len(), 1);

        // Nothing new, nothing written
        ledger.flush().unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_failed_flush_keeps_buffer() {
        let store = MemoryStore::new();
        let mut ledger = PaperLedger::new(Box::new(store.clone()));
        ledger.record(&intent("m1", Side::Yes, 10, dec!(0.40)), Utc::now());

        store.set_failing(true);
        assert!(ledger.flush().is_err());
        assert!(ledger.has_unflushed());
    }

    #[test]
    fn test_stats() {
        let mut ledger = PaperLedger::new(Box::new(MemoryStore::new()));
        let now = Utc::now();
        ledger.record(&intent("m1", Side::Yes, 10, dec!(0.60)), now);
        ledger.record(&intent("m1", Side::No, 10, dec!(0.30)), now);
        ledger.record(&intent("m2", Side::Yes, 10, dec!(0.50)), now);

        assert!(ledger.resolve("m1", Side::Yes, now));
        assert!(!ledger.resolve("m1", Side::No, now));

        let stats = ledger.stats();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.resolved_trades, 2);
        assert_eq!(stats.pending_trades, 1);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.win_rate, dec!(50));
        assert_eq!(stats.total_invested, dec!(14.00));
        // +4.00 on YES, -3.00 on NO
        assert_eq!(stats.total_pnl, dec!(1.00));
        assert_eq!(ledger.pending_trades().len(), 1);
    }

    #[test]
    fn test_load_restores_document() {
        let store = MemoryStore::new();
        let mut ledger = PaperLedger::new(Box::new(store.clone()));
        ledger.record(&intent("m1", Side::No, 2, dec!(0.10)), Utc::now());
        ledger.flush().unwrap();

        let restored = PaperLedger::load(Box::new(store)).unwrap();
        assert_eq!(restored.trades().len(), 1);
        assert!(!restored.has_unflushed());
    }
}
