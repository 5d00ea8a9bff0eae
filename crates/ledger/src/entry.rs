//! The engine's outputs: append-only ledger entries, realized-PnL
//! sub-events and valuation snapshots.

use alloy_primitives::{Address, B256, U256};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntryKind {
    TradeBuy,
    TradeSell,
    Split,
    Merge,
    Redemption,
    AdapterSplit,
    AdapterMerge,
    AdapterRedemption,
    AdapterConversion,
    Mint,
    Burn,
    TransferIn,
    TransferOut,
    FeeRefund,
    FeeWithdrawal,
    ResolutionLoss,
}

/// One accounting decision. `realized_pnl` is always
/// `proceeds - cost_basis` over whatever the event consumed; basis-shifting
/// events carry zero.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEntry {
    /// Deterministic across replays of the same event sequence.
    pub id: String,
    pub wallet: Address,
    pub kind: EntryKind,
    pub tx_hash: B256,
    pub log_index: i64,
    pub block_number: i64,
    pub timestamp: i64,
    pub token_id: Option<U256>,
    pub condition_id: Option<B256>,
    pub quantity: f64,
    pub cash_delta: f64,
    pub unit_price: f64,
    pub cost_basis: f64,
    pub realized_pnl: f64,
    /// For sells, the quantity-weighted mean `opened_at` of the consumed
    /// lots; the event timestamp otherwise.
    pub entry_timestamp: i64,
    pub metadata: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RealizedKind {
    Sell,
    Redemption,
    Merge,
    ResolutionLoss,
    Fee,
}

/// Per-lot realization record, the input of the PnL aggregator.
#[derive(Clone, Debug, PartialEq)]
pub struct RealizedEvent {
    pub kind: RealizedKind,
    pub at: i64,
    /// When the consumed lot was opened. Absent for fee credits and for
    /// consumption that had no lot to match (zero-basis anomalies).
    pub opened_at: Option<i64>,
    pub token_id: Option<U256>,
    pub proceeds: f64,
    pub cost_basis: f64,
    pub realized_pnl: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub wallet: Address,
    pub at: i64,
    pub realized_cum: f64,
    pub unrealized: f64,
    pub open_cost: f64,
    pub open_value: f64,
    pub cashflow_cum: f64,
    pub open_token_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_as_snake_case() {
        assert_eq!(EntryKind::TradeBuy.to_string(), "trade_buy");
        assert_eq!(EntryKind::AdapterConversion.to_string(), "adapter_conversion");
        assert_eq!(EntryKind::ResolutionLoss.to_string(), "resolution_loss");
        assert_eq!(RealizedKind::Fee.to_string(), "fee");
    }
}
