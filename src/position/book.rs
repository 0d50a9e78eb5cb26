//! The position book: sole owner and writer of positions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use super::store::Store;
use super::types::{Fill, Position, PositionStatus, SettledPosition};
use crate::common::errors::Result;
use crate::common::types::Side;

/// Serialized form of the book, one entry per market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    pub positions: BTreeMap<String, Vec<Position>>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Open and closed positions keyed by market
///
/// Every mutation is saved through the store before it returns. A failed save
/// surfaces as `BotError::Persistence` and the caller must stop.
pub struct PositionBook {
    positions: BTreeMap<String, Vec<Position>>,
    store: Box<dyn Store<BookDocument>>,
}

impl std::fmt::Debug for PositionBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionBook")
            .field("positions", &self.positions)
            .finish_non_exhaustive()
    }
}

impl PositionBook {
    /// An empty book backed by `store`
    pub fn new(store: Box<dyn Store<BookDocument>>) -> Self {
        Self {
            positions: BTreeMap::new(),
            store,
        }
    }

    /// Restore the book from `store`
    pub fn load(store: Box<dyn Store<BookDocument>>) -> Result<Self> {
        let document = store.load()?.unwrap_or_default();
        let book = Self {
            positions: document.positions,
            store,
        };
        info!(
            "Loaded {} open positions across {} markets",
            book.open_positions().len(),
            book.positions.len()
        );
        Ok(book)
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&BookDocument {
            positions: self.positions.clone(),
            saved_at: Some(Utc::now()),
        })
    }

    fn open_position_mut(&mut self, market_id: &str, side: Side) -> Option<&mut Position> {
        self.positions
            .get_mut(market_id)?
            .iter_mut()
            .find(|p| p.side == side && p.is_open())
    }

    /// Record a fill: open a position, or average into the open one
    ///
    /// `new_avg = (old_qty * old_avg + qty * price) / (old_qty + qty)`
    #[instrument(skip(self, fill), fields(market_id = %fill.market_id, side = %fill.side))]
    pub fn open_or_accumulate(&mut self, fill: Fill) -> Result<Position> {
        fill.validate()?;

        let position = match self.open_position_mut(&fill.market_id, fill.side) {
            Some(existing) => {
                let old_qty = Decimal::from(existing.quantity);
                let new_qty = Decimal::from(fill.quantity);
                existing.avg_entry_price =
                    (old_qty * existing.avg_entry_price + new_qty * fill.price) / (old_qty + new_qty);
                existing.quantity += fill.quantity;
                info!(
                    "Updated position: {} shares @ ${:.3}",
                    existing.quantity, existing.avg_entry_price
                );
                existing.clone()
            }
            None => {
                let position = Position {
                    market_id: fill.market_id.clone(),
                    question: fill.question,
                    side: fill.side,
                    quantity: fill.quantity,
                    avg_entry_price: fill.price,
                    entry_time: fill.timestamp,
                    close_time: fill.close_time,
                    status: PositionStatus::Open,
                    realized_pnl: None,
                    unrealized_pnl: Decimal::ZERO,
                    mark_price: None,
                    strategy: fill.strategy,
                    closed_at: None,
                    exit_price: None,
                };
                info!(
                    "New position opened: {} shares @ ${:.3}, cost ${:.2}",
                    position.quantity,
                    position.avg_entry_price,
                    position.cost_basis()
                );
                self.positions
                    .entry(fill.market_id)
                    .or_default()
                    .push(position.clone());
                position
            }
        };

        self.persist()?;
        Ok(position)
    }

    /// Revalue every open position on a market
    ///
    /// A side without a price keeps its previous mark. Returns how many
    /// positions were updated.
    pub fn mark_to_market(
        &mut self,
        market_id: &str,
        yes_price: Option<Decimal>,
        no_price: Option<Decimal>,
    ) -> Result<usize> {
        let Some(positions) = self.positions.get_mut(market_id) else {
            return Ok(0);
        };

        let mut updated = 0;
        for position in positions.iter_mut().filter(|p| p.is_open()) {
            let price = match position.side {
                Side::Yes => yes_price,
                Side::No => no_price,
            };
            if let Some(price) = price {
                position.unrealized_pnl = position.pnl_at(price);
                position.mark_price = Some(price);
                updated += 1;
            }
        }

        if updated > 0 {
            debug!(market_id, updated, "Marked positions to market");
            self.persist()?;
        }
        Ok(updated)
    }

    /// Close every open position on a market at the binary payout
    ///
    /// The winning side realizes `qty * (1 - avg)`, the losing side `-qty * avg`.
    #[instrument(skip(self))]
    pub fn settle(
        &mut self,
        market_id: &str,
        winning_side: Side,
        at: DateTime<Utc>,
    ) -> Result<Vec<SettledPosition>> {
        let Some(positions) = self.positions.get_mut(market_id) else {
            return Ok(Vec::new());
        };

        let mut settled = Vec::new();
        for position in positions.iter_mut().filter(|p| p.is_open()) {
            let won = position.side == winning_side;
            let exit_price = if won { Decimal::ONE } else { Decimal::ZERO };
            let realized = position.pnl_at(exit_price);

            position.status = PositionStatus::Closed;
            position.realized_pnl = Some(realized);
            position.unrealized_pnl = Decimal::ZERO;
            position.exit_price = Some(exit_price);
            position.closed_at = Some(at);

            info!(
                side = %position.side,
                "Position settled {}: {} shares @ ${:.3}, P/L ${:+.2}",
                if won { "WON" } else { "LOST" },
                position.quantity,
                position.avg_entry_price,
                realized
            );
            settled.push(SettledPosition {
                market_id: market_id.to_string(),
                side: position.side,
                quantity: position.quantity,
                avg_entry_price: position.avg_entry_price,
                realized_pnl: realized,
                won,
            });
        }

        if !settled.is_empty() {
            self.persist()?;
        }
        Ok(settled)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn open_position(&self, market_id: &str, side: Side) -> Option<&Position> {
        self.positions
            .get(market_id)?
            .iter()
            .find(|p| p.side == side && p.is_open())
    }

    pub fn has_open(&self, market_id: &str, side: Side) -> bool {
        self.open_position(market_id, side).is_some()
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.positions
            .values()
            .flatten()
            .filter(|p| p.is_open())
            .collect()
    }

    /// Every position on a market, open or closed
    pub fn positions_for(&self, market_id: &str) -> &[Position] {
        self.positions
            .get(market_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn positions_by_strategy(&self, strategy: &str) -> Vec<&Position> {
        self.positions
            .values()
            .flatten()
            .filter(|p| p.strategy == strategy)
            .collect()
    }

    /// Markets with an open position whose close time has passed
    pub fn markets_due_for_settlement(&self, now: DateTime<Utc>) -> Vec<String> {
        self.positions
            .iter()
            .filter(|(_, positions)| {
                positions
                    .iter()
                    .any(|p| p.is_open() && p.close_time <= now)
            })
            .map(|(market_id, _)| market_id.clone())
            .collect()
    }

    /// Markets with at least one open position
    pub fn open_markets(&self) -> Vec<String> {
        self.positions
            .iter()
            .filter(|(_, positions)| positions.iter().any(Position::is_open))
            .map(|(market_id, _)| market_id.clone())
            .collect()
    }

    /// Capital at risk across open positions
    pub fn total_exposure(&self) -> Decimal {
        self.open_positions().iter().map(|p| p.cost_basis()).sum()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.open_positions().iter().map(|p| p.unrealized_pnl).sum()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.positions
            .values()
            .flatten()
            .filter_map(|p| p.realized_pnl)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::BotError;
    use crate::position::store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn fill(market: &str, side: Side, quantity: u64, price: Decimal) -> Fill {
        Fill {
            market_id: market.to_string(),
            question: "BTC up?".to_string(),
            side,
            quantity,
            price,
            timestamp: now(),
            close_time: now() + Duration::minutes(15),
            strategy: "PriceArbitrage".to_string(),
        }
    }

    fn book() -> (PositionBook, MemoryStore<BookDocument>) {
        let store = MemoryStore::new();
        (PositionBook::new(Box::new(store.clone())), store)
    }

    #[test]
    fn test_open_then_accumulate() {
        let (mut book, store) = book();

        book.open_or_accumulate(fill("m1", Side::Yes, 10, dec!(0.40))).unwrap();
        let position = book.open_or_accumulate(fill("m1", Side::Yes, 30, dec!(0.60))).unwrap();

        assert_eq!(position.quantity, 40);
        assert_eq!(position.avg_entry_price, dec!(0.55));
        assert_eq!(position.entry_time, now());
        assert_eq!(book.positions_for("m1").len(), 1);
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_sides_are_separate_positions() {
        let (mut book, _) = book();
        book.open_or_accumulate(fill("m1", Side::Yes, 10, dec!(0.48))).unwrap();
        book.open_or_accumulate(fill("m1", Side::No, 10, dec!(0.48))).unwrap();

        assert!(book.has_open("m1", Side::Yes));
        assert!(book.has_open("m1", Side::No));
        assert_eq!(book.open_positions().len(), 2);
        assert_eq!(book.total_exposure(), dec!(9.60));
    }

    #[test]
    fn test_invalid_fill_is_rejected_without_saving() {
        let (mut book, store) = book();
        assert!(book.open_or_accumulate(fill("m1", Side::Yes, 0, dec!(0.5))).is_err());
        assert!(book.open_or_accumulate(fill("m1", Side::Yes, 5, dec!(1.5))).is_err());
        assert!(book.open_positions().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_mark_to_market() {
        let (mut book, _) = book();
        book.open_or_accumulate(fill("m1", Side::Yes, 10, dec!(0.40))).unwrap();
        book.open_or_accumulate(fill("m1", Side::No, 10, dec!(0.50))).unwrap();

        let updated = book.mark_to_market("m1", Some(dec!(0.55)), None).unwrap();
        assert_eq!(updated, 1);

        let yes = book.open_position("m1", Side::Yes).unwrap();
        assert_eq!(yes.unrealized_pnl, dec!(1.50));
        assert_eq!(yes.mark_price, Some(dec!(0.55)));
        assert_eq!(book.open_position("m1", Side::No).unwrap().mark_price, None);
        assert_eq!(book.mark_to_market("unknown", Some(dec!(0.5)), None).unwrap(), 0);
    }

    #[test]
    fn test_settle_pays_winner_and_closes_all() {
        let (mut book, _) = book();
        book.open_or_accumulate(fill("m1", Side::Yes, 10, dec!(0.60))).unwrap();
        book.open_or_accumulate(fill("m1", Side::No, 5, dec!(0.30))).unwrap();

        let settled = book.settle("m1", Side::Yes, now()).unwrap();
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0].realized_pnl, dec!(4.00));
        assert!(settled[0].won);
        assert_eq!(settled[1].realized_pnl, dec!(-1.50));

        assert!(book.open_positions().is_empty());
        assert_eq!(book.realized_pnl(), dec!(2.50));
        assert_eq!(book.positions_for("m1")[0].exit_price, Some(Decimal::ONE));

        // Settling again is a no-op
        assert!(book.settle("m1", Side::No, now()).unwrap().is_empty());
    }

    #[test]
    fn test_new_position_after_settlement() {
        let (mut book, _) = book();
        book.open_or_accumulate(fill("m1", Side::Yes, 10, dec!(0.60))).unwrap();
        book.settle("m1", Side::No, now()).unwrap();
        book.open_or_accumulate(fill("m1", Side::Yes, 4, dec!(0.20))).unwrap();

        assert_eq!(book.positions_for("m1").len(), 2);
        assert_eq!(book.open_position("m1", Side::Yes).unwrap().quantity, 4);
    }

    #[test]
    fn test_markets_due_for_settlement() {
        let (mut book, _) = book();
        book.open_or_accumulate(fill("m1", Side::Yes, 10, dec!(0.60))).unwrap();

        assert!(book.markets_due_for_settlement(now()).is_empty());
        assert_eq!(
            book.markets_due_for_settlement(now() + Duration::minutes(15)),
            vec!["m1".to_string()]
        );
        assert_eq!(book.open_markets(), vec!["m1".to_string()]);
    }

    #[test]
    fn test_load_restores_saved_book() {
        let (mut book, store) = book();
        book.open_or_accumulate(fill("m1", Side::No, 3, dec!(0.25))).unwrap();

        let restored = PositionBook::load(Box::new(store)).unwrap();
        assert_eq!(restored.open_position("m1", Side::No).unwrap().quantity, 3);
        assert_eq!(restored.positions_by_strategy("PriceArbitrage").len(), 1);
    }

    #[test]
    fn test_failed_save_is_persistence_error() {
        let (mut book, store) = book();
        store.set_failing(true);

        let result = book.open_or_accumulate(fill("m1", Side::Yes, 1, dec!(0.5)));
        assert!(matches!(result, Err(BotError::Persistence(_))));
    }
}
