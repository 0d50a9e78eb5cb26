//! Inputs shared by every strategy evaluation

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::common::types::MarketSnapshot;

/// Read-only context for one evaluation pass
///
/// Strategies keep no state between calls; anything that depends on earlier
/// cycles (price history) arrives through here.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Evaluation time; rules never read the wall clock themselves
    pub now: DateTime<Utc>,
    /// Previous cycle's snapshots, keyed by market id
    pub previous: HashMap<String, MarketSnapshot>,
}

impl EvaluationContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            previous: HashMap::new(),
        }
    }

    pub fn with_previous(mut self, previous: HashMap<String, MarketSnapshot>) -> Self {
        self.previous = previous;
        self
    }

    /// The previous cycle's snapshot of a market, if it was seen
    pub fn previous_snapshot(&self, market_id: &str) -> Option<&MarketSnapshot> {
        self.previous.get(market_id)
    }
}
