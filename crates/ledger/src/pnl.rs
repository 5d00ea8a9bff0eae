//! Period PnL queries: post-filters the replay's realized sub-events and,
//! depending on the mode, folds in unrealized PnL on open lots.

use {
    crate::{
        entry::{RealizedEvent, RealizedKind},
        inventory::Inventory,
    },
    alloy_primitives::U256,
    std::collections::HashMap,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PnlMode {
    /// Realizations inside the period on positions also opened inside it.
    RealizedPeriod,
    /// Every realization inside the period, whenever the position was
    /// opened.
    RealizedWithHistory,
    /// `RealizedPeriod` plus unrealized PnL on lots opened in the period.
    PeriodPlusUnrealized,
    /// `RealizedWithHistory` plus unrealized PnL on all open lots.
    Total,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PnlPeriod {
    pub start: i64,
    pub end: i64,
}

impl PnlPeriod {
    fn contains(&self, at: i64) -> bool {
        (self.start..=self.end).contains(&at)
    }
}

/// Sums grouped by realization kind plus the open-position totals.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PnlReport {
    pub sell: f64,
    pub redemption: f64,
    pub merge: f64,
    pub resolution_loss: f64,
    pub fee: f64,
    pub realized: f64,
    pub proceeds: f64,
    pub cost_basis: f64,
    pub open_cost: f64,
    pub open_value: f64,
    pub unrealized: f64,
    pub total: f64,
}

pub fn aggregate(
    realized: &[RealizedEvent],
    inventory: &Inventory,
    prices: &HashMap<U256, f64>,
    mode: PnlMode,
    period: PnlPeriod,
) -> PnlReport {
    let mut report = PnlReport::default();

    let with_history = matches!(mode, PnlMode::RealizedWithHistory | PnlMode::Total);
    for event in realized {
        if !period.contains(event.at) {
            continue;
        }
        // in period-only modes a realization of a position opened before
        // the period belongs to that earlier period, not this one
        if !with_history
            && event
                .opened_at
                .is_some_and(|opened_at| !period.contains(opened_at))
        {
            continue;
        }
        let bucket = match event.kind {
            RealizedKind::Sell => &mut report.sell,
            RealizedKind::Redemption => &mut report.redemption,
            RealizedKind::Merge => &mut report.merge,
            RealizedKind::ResolutionLoss => &mut report.resolution_loss,
            RealizedKind::Fee => &mut report.fee,
        };
        *bucket += event.realized_pnl;
        report.realized += event.realized_pnl;
        report.proceeds += event.proceeds;
        report.cost_basis += event.cost_basis;
    }

    let window = match mode {
        PnlMode::RealizedPeriod | PnlMode::RealizedWithHistory => None,
        PnlMode::PeriodPlusUnrealized => Some(Some((period.start, period.end))),
        PnlMode::Total => Some(None),
    };
    if let Some(window) = window {
        report.open_cost = inventory.open_cost(window);
        report.open_value = inventory.open_value(prices, window);
        report.unrealized = report.open_value - report.open_cost;
    }
    report.total = report.realized + report.unrealized;
    report
}
