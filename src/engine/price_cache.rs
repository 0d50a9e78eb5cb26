//! Latest WebSocket price per (market, side)

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::common::types::{PriceUpdate, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CachedPrice {
    price: Decimal,
    received_at: DateTime<Utc>,
}

/// Cache of the newest price hint seen for each (market, side)
///
/// Entries are only ever consulted, never waited on.
#[derive(Debug, Default)]
pub struct LatestPriceCache {
    prices: HashMap<(String, Side), CachedPrice>,
}

impl LatestPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update; an older update never replaces a newer one
    pub fn apply(&mut self, update: PriceUpdate) {
        let key = (update.market_id, update.side);
        match self.prices.get(&key) {
            Some(existing) if existing.received_at > update.received_at => {}
            _ => {
                self.prices.insert(
                    key,
                    CachedPrice {
                        price: update.price,
                        received_at: update.received_at,
                    },
                );
            }
        }
    }

    /// Apply every update already queued on `rx` without waiting
    ///
    /// Returns the number of updates applied.
    pub fn drain(&mut self, rx: &mut mpsc::Receiver<PriceUpdate>) -> usize {
        let mut applied = 0;
        while let Ok(update) = rx.try_recv() {
            self.apply(update);
            applied += 1;
        }
        if applied > 0 {
            trace!(applied, cached = self.prices.len(), "Drained price hints");
        }
        applied
    }

    /// Latest price regardless of age
    pub fn latest(&self, market_id: &str, side: Side) -> Option<Decimal> {
        self.prices
            .get(&(market_id.to_string(), side))
            .map(|c| c.price)
    }

    /// Latest price if it was received within `staleness` of `now`
    pub fn fresh(
        &self,
        market_id: &str,
        side: Side,
        now: DateTime<Utc>,
        staleness: Duration,
    ) -> Option<Decimal> {
        self.prices
            .get(&(market_id.to_string(), side))
            .filter(|c| now - c.received_at <= staleness)
            .map(|c| c.price)
    }

    /// Drop both sides of a market
    pub fn forget(&mut self, market_id: &str) {
        for side in [Side::Yes, Side::No] {
            self.prices.remove(&(market_id.to_string(), side));
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::channels::create_price_channel;
    use rust_decimal_macros::dec;

    fn update(side: Side, price: Decimal, at: DateTime<Utc>) -> PriceUpdate {
        PriceUpdate {
            market_id: "m1".to_string(),
            side,
            price,
            received_at: at,
        }
    }

    #[test]
    fn test_fresh_respects_staleness() {
        let now = Utc::now();
        let mut cache = LatestPriceCache::new();
        cache.apply(update(Side::Yes, dec!(0.52), now - Duration::seconds(45)));
        cache.apply(update(Side::No, dec!(0.47), now - Duration::seconds(5)));

        let staleness = Duration::seconds(30);
        assert_eq!(cache.fresh("m1", Side::Yes, now, staleness), None);
        assert_eq!(cache.fresh("m1", Side::No, now, staleness), Some(dec!(0.47)));
        assert_eq!(cache.latest("m1", Side::Yes), Some(dec!(0.52)));
        assert_eq!(cache.fresh("m2", Side::No, now, staleness), None);
    }

    #[test]
    fn test_out_of_order_update_is_ignored() {
        let now = Utc::now();
        let mut cache = LatestPriceCache::new();
        cache.apply(update(Side::Yes, dec!(0.60), now));
        cache.apply(update(Side::Yes, dec!(0.40), now - Duration::seconds(1)));
        assert_eq!(cache.latest("m1", Side::Yes), Some(dec!(0.60)));
    }

    #[test]
    fn test_forget_drops_both_sides() {
        let now = Utc::now();
        let mut cache = LatestPriceCache::new();
        cache.apply(update(Side::Yes, dec!(0.52), now));
        cache.apply(update(Side::No, dec!(0.47), now));
        cache.apply(PriceUpdate {
            market_id: "m2".to_string(),
            ..update(Side::Yes, dec!(0.30), now)
        });

        cache.forget("m1");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.latest("m1", Side::Yes), None);
        assert_eq!(cache.latest("m2", Side::Yes), Some(dec!(0.30)));
    }

    #[tokio::test]
    async fn test_drain_does_not_block() {
        let (tx, mut rx) = create_price_channel();
        let mut cache = LatestPriceCache::new();
        assert_eq!(cache.drain(&mut rx), 0);

        let now = Utc::now();
        tx.send(update(Side::Yes, dec!(0.51), now)).await.unwrap();
        tx.send(update(Side::Yes, dec!(0.53), now)).await.unwrap();

        assert_eq!(cache.drain(&mut rx), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.latest("m1", Side::Yes), Some(dec!(0.53)));
    }
}
