//! Built-in threshold rules
//!
//! Every rule is a single pass over the snapshots. Where a rule buys "the
//! cheaper side", a tie goes to YES.

use rust_decimal::Decimal;

use crate::common::errors::Result;
use crate::common::types::{MarketSnapshot, Side, TradeIntent};
use crate::config::types::StrategyRule;
use crate::strategy::traits::Strategy;
use crate::strategy::types::EvaluationContext;

/// A configured [`StrategyRule`] with its trade size
#[derive(Debug, Clone, PartialEq)]
pub struct RuleStrategy {
    rule: StrategyRule,
    shares: u64,
}

impl RuleStrategy {
    pub fn new(rule: StrategyRule, shares: u64) -> Self {
        Self { rule, shares }
    }

    pub fn rule(&self) -> &StrategyRule {
        &self.rule
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }

    /// Side to buy and the justification, or `None` if the rule does not fire
    fn decide(&self, snapshot: &MarketSnapshot, ctx: &EvaluationContext) -> Option<(Side, String)> {
        let (yes, no) = snapshot.prices()?;

        match &self.rule {
            StrategyRule::PriceArbitrage { deviation_threshold } => {
                let total = yes + no;
                let deficit = Decimal::ONE - total;
                if total >= Decimal::ONE || deficit <= *deviation_threshold {
                    return None;
                }
                let side = snapshot.cheaper_side()?;
                Some((
                    side,
                    format!(
                        "Arbitrage: {} underpriced at {:.3} (total={:.3})",
                        side,
                        price_of(side, yes, no),
                        total
                    ),
                ))
            }

            StrategyRule::MeanReversion { extreme_threshold } => {
                if yes > *extreme_threshold {
                    Some((
                        Side::No,
                        format!("Mean reversion: YES overpriced at {:.3}, buying NO at {:.3}", yes, no),
                    ))
                } else if no > *extreme_threshold {
                    Some((
                        Side::Yes,
                        format!("Mean reversion: NO overpriced at {:.3}, buying YES at {:.3}", no, yes),
                    ))
                } else {
                    None
                }
            }

            StrategyRule::SimpleBalanced { min_edge } => {
                if (yes - no).abs() < *min_edge {
                    return None;
                }
                let side = snapshot.cheaper_side()?;
                Some((
                    side,
                    format!(
                        "Contrarian: {} cheaper at {:.3} vs {} at {:.3}",
                        side,
                        price_of(side, yes, no),
                        side.opposite(),
                        price_of(side.opposite(), yes, no)
                    ),
                ))
            }

            StrategyRule::Momentum { momentum_threshold } => {
                let (last_yes, last_no) = ctx.previous_snapshot(&snapshot.market_id)?.prices()?;
                let yes_change = yes - last_yes;
                let no_change = no - last_no;
                if yes_change >= *momentum_threshold {
                    Some((
                        Side::Yes,
                        format!("Momentum: YES rising (+{:.3} to {:.3})", yes_change, yes),
                    ))
                } else if no_change >= *momentum_threshold {
                    Some((
                        Side::No,
                        format!("Momentum: NO rising (+{:.3} to {:.3})", no_change, no),
                    ))
                } else {
                    None
                }
            }

            StrategyRule::VolumeSpike {
                volume_threshold,
                min_imbalance,
            } => {
                if snapshot.volume < *volume_threshold || (yes - no).abs() < *min_imbalance {
                    return None;
                }
                let side = snapshot.cheaper_side()?;
                Some((
                    side,
                    format!(
                        "Volume spike: high volume (${:.0}), {} cheaper at {:.3}",
                        snapshot.volume,
                        side,
                        price_of(side, yes, no)
                    ),
                ))
            }

            StrategyRule::TimeBased {
                minutes_before_close,
                min_edge,
            } => {
                let minutes_left = snapshot.minutes_until_close(ctx.now);
                if minutes_left > *minutes_before_close || (yes - no).abs() < *min_edge {
                    return None;
                }
                let side = snapshot.cheaper_side()?;
                Some((
                    side,
                    format!(
                        "Time-based: {:.1} min left, {} cheaper at {:.3}",
                        minutes_left,
                        side,
                        price_of(side, yes, no)
                    ),
                ))
            }

            StrategyRule::HighConfidenceClose {
                hours_until_close,
                confidence_threshold,
                min_volume,
            } => {
                let hours_left = snapshot.hours_until_close(ctx.now);
                if hours_left < Decimal::ZERO
                    || hours_left > *hours_until_close
                    || snapshot.volume < *min_volume
                {
                    return None;
                }
                if yes >= *confidence_threshold {
                    Some((
                        Side::Yes,
                        format!("High confidence YES ({:.3}) with {:.2}h until close", yes, hours_left),
                    ))
                } else if no >= *confidence_threshold {
                    Some((
                        Side::No,
                        format!("High confidence NO ({:.3}) with {:.2}h until close", no, hours_left),
                    ))
                } else {
                    None
                }
            }
        }
    }
}

fn price_of(side: Side, yes: Decimal, no: Decimal) -> Decimal {
    match side {
        Side::Yes => yes,
        Side::No => no,
    }
}

impl Strategy for RuleStrategy {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn evaluate(
        &self,
        snapshots: &[MarketSnapshot],
        ctx: &EvaluationContext,
    ) -> Result<Vec<TradeIntent>> {
        Ok(snapshots
            .iter()
            .filter_map(|snapshot| {
                let (side, reason) = self.decide(snapshot, ctx)?;
                TradeIntent::buy(snapshot, side, self.shares, self.name(), reason)
            })
            .collect())
    }
}
