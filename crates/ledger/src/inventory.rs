//! Per-token FIFO lot book. Lots are never merged, so consumption can
//! attribute cost basis and holding period to the exact acquisition.

use {
    alloy_primitives::U256,
    std::collections::{BTreeMap, VecDeque},
};

/// Residual quantities below this are dust left by fractional consumption
/// and are dropped.
pub const QUANTITY_EPSILON: f64 = 1e-7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lot {
    pub quantity: f64,
    pub unit_cost: f64,
    pub opened_at: i64,
}

/// One lot's share of a consumption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Consumption {
    pub quantity: f64,
    pub unit_cost: f64,
    pub opened_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Consumed {
    pub cost_basis: f64,
    pub lots: Vec<Consumption>,
    /// Quantity requested beyond what the book held. The caller decides how
    /// to account for it (the engine books it at zero basis).
    pub shortfall: f64,
}

/// The wallet's open positions. Buckets are keyed by outcome-token id and
/// iterate in token order so replays are deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    buckets: BTreeMap<U256, VecDeque<Lot>>,
}

impl Inventory {
    /// Appends a lot. Zero and dust quantities are ignored.
    pub fn add(&mut self, token_id: U256, quantity: f64, unit_cost: f64, opened_at: i64) {
        if quantity <= QUANTITY_EPSILON {
            return;
        }
        self.buckets.entry(token_id).or_default().push_back(Lot {
            quantity,
            unit_cost,
            opened_at,
        });
    }

    /// Pops `quantity` off the head of the bucket, oldest lot first.
    /// Partial lots are split; a lot whose residual drops below the epsilon
    /// is removed. Requests beyond the held quantity are reported as
    /// `shortfall` rather than refused.
    pub fn consume(&mut self, token_id: U256, quantity: f64) -> Consumed {
        let mut remaining = quantity;
        let mut consumed = Consumed::default();
        if remaining <= QUANTITY_EPSILON {
            return consumed;
        }
        if let Some(bucket) = self.buckets.get_mut(&token_id) {
            while remaining > QUANTITY_EPSILON {
                let Some(front) = bucket.front_mut() else {
                    break;
                };
                let take = front.quantity.min(remaining);
                consumed.cost_basis += take * front.unit_cost;
                consumed.lots.push(Consumption {
                    quantity: take,
                    unit_cost: front.unit_cost,
                    opened_at: front.opened_at,
                });
                front.quantity -= take;
                remaining -= take;
                if front.quantity < QUANTITY_EPSILON {
                    bucket.pop_front();
                }
            }
            if bucket.is_empty() {
                self.buckets.remove(&token_id);
            }
        }
        consumed.shortfall = remaining.max(0.0);
        consumed
    }

    pub fn total_quantity(&self, token_id: U256) -> f64 {
        self.buckets
            .get(&token_id)
            .map(|bucket| bucket.iter().map(|lot| lot.quantity).sum())
            .unwrap_or(0.0)
    }

    pub fn weighted_avg_unit_cost(&self, token_id: U256) -> Option<f64> {
        let bucket = self.buckets.get(&token_id)?;
        let quantity: f64 = bucket.iter().map(|lot| lot.quantity).sum();
        if quantity <= QUANTITY_EPSILON {
            return None;
        }
        let cost: f64 = bucket.iter().map(|lot| lot.quantity * lot.unit_cost).sum();
        Some(cost / quantity)
    }

    /// Every non-empty bucket, in token order.
    pub fn open_positions(&self) -> impl Iterator<Item = (U256, &VecDeque<Lot>)> {
        self.buckets.iter().map(|(token, bucket)| (*token, bucket))
    }

    pub fn open_lots(&self) -> impl Iterator<Item = (U256, &Lot)> {
        self.buckets
            .iter()
            .flat_map(|(token, bucket)| bucket.iter().map(move |lot| (*token, lot)))
    }

    pub fn open_token_count(&self) -> usize {
        self.buckets.len()
    }

    /// Cost of open lots, optionally restricted to lots opened inside
    /// `[window.0, window.1]`.
    pub fn open_cost(&self, window: Option<(i64, i64)>) -> f64 {
        self.open_lots()
            .filter(|(_, lot)| in_window(lot.opened_at, window))
            .map(|(_, lot)| lot.quantity * lot.unit_cost)
            .sum()
    }

    /// Value of open lots under `prices`. A token with no quoted price is
    /// carried at its own cost, contributing zero unrealized PnL.
    pub fn open_value(
        &self,
        prices: &std::collections::HashMap<U256, f64>,
        window: Option<(i64, i64)>,
    ) -> f64 {
        self.open_lots()
            .filter(|(_, lot)| in_window(lot.opened_at, window))
            .map(|(token, lot)| {
                let price = prices.get(&token).copied().unwrap_or(lot.unit_cost);
                lot.quantity * price
            })
            .sum()
    }
}

fn in_window(opened_at: i64, window: Option<(i64, i64)>) -> bool {
    window.is_none_or(|(start, end)| (start..=end).contains(&opened_at))
}
