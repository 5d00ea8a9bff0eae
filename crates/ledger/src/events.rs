//! Typed chain events and the total order the engine replays them in.

use alloy_primitives::{Address, B256, U256};

/// Synthetic resolution events sort after every real log of their block.
pub const RESOLUTION_LOG_INDEX: i64 = i64::MAX;

/// Total ordering key of the unified stream:
/// `(timestamp, block, log index, type tag)` ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tag: EventTag,
}

/// Tie-break for events that share `(timestamp, block, log index)`.
/// Declaration order is the sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventTag {
    Trade,
    Split,
    Merge,
    Redemption,
    AdapterSplit,
    AdapterMerge,
    AdapterRedemption,
    AdapterConversion,
    Transfer,
    FeeRefund,
    FeeWithdrawal,
    Resolution,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeRole {
    Maker,
    Taker,
}

impl TradeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maker => "maker",
            Self::Taker => "taker",
        }
    }
}

/// One side of an `OrderFilled` from the wallet's point of view. A fill
/// where the wallet is both maker and taker yields two events.
#[derive(Clone, Debug, PartialEq)]
pub struct Trade {
    pub tx_hash: B256,
    pub token_id: U256,
    pub usdc_amount: U256,
    pub token_amount: U256,
    pub fee: U256,
    pub is_buy: bool,
    pub role: TradeRole,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Split {
    pub tx_hash: B256,
    pub collateral: Address,
    pub parent_collection_id: B256,
    pub condition_id: B256,
    pub partition: Vec<U256>,
    pub amount: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Merge {
    pub tx_hash: B256,
    pub collateral: Address,
    pub parent_collection_id: B256,
    pub condition_id: B256,
    pub partition: Vec<U256>,
    pub amount: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Redemption {
    pub tx_hash: B256,
    pub collateral: Address,
    pub parent_collection_id: B256,
    pub condition_id: B256,
    pub index_sets: Vec<U256>,
    pub payout: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterSplit {
    pub tx_hash: B256,
    pub condition_id: B256,
    pub amount: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterMerge {
    pub tx_hash: B256,
    pub condition_id: B256,
    pub amount: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterRedemption {
    pub tx_hash: B256,
    pub condition_id: B256,
    /// Burned outcome-token amount per outcome index, 18-decimal raw.
    pub amounts: Vec<U256>,
    pub payout: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterConversion {
    pub tx_hash: B256,
    pub market_id: B256,
    pub index_set: U256,
    pub amount: U256,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transfer {
    pub tx_hash: B256,
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
    pub value: U256,
}

/// Fee refunds and fee withdrawals share this shape; both credit the
/// wallet in collateral.
#[derive(Clone, Debug, PartialEq)]
pub struct FeePayout {
    pub tx_hash: B256,
    pub token_id: Option<U256>,
    pub amount: U256,
}

/// Synthetic event injected per resolved condition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub condition_id: B256,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChainEvent {
    Trade(Trade),
    Split(Split),
    Merge(Merge),
    Redemption(Redemption),
    AdapterSplit(AdapterSplit),
    AdapterMerge(AdapterMerge),
    AdapterRedemption(AdapterRedemption),
    AdapterConversion(AdapterConversion),
    Transfer(Transfer),
    FeeRefund(FeePayout),
    FeeWithdrawal(FeePayout),
    Resolution(Resolution),
}

impl ChainEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            Self::Trade(_) => EventTag::Trade,
            Self::Split(_) => EventTag::Split,
            Self::Merge(_) => EventTag::Merge,
            Self::Redemption(_) => EventTag::Redemption,
            Self::AdapterSplit(_) => EventTag::AdapterSplit,
            Self::AdapterMerge(_) => EventTag::AdapterMerge,
            Self::AdapterRedemption(_) => EventTag::AdapterRedemption,
            Self::AdapterConversion(_) => EventTag::AdapterConversion,
            Self::Transfer(_) => EventTag::Transfer,
            Self::FeeRefund(_) => EventTag::FeeRefund,
            Self::FeeWithdrawal(_) => EventTag::FeeWithdrawal,
            Self::Resolution(_) => EventTag::Resolution,
        }
    }

    /// The transaction this event was logged in. Synthetic resolutions have
    /// none.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::Trade(e) => Some(e.tx_hash),
            Self::Split(e) => Some(e.tx_hash),
            Self::Merge(e) => Some(e.tx_hash),
            Self::Redemption(e) => Some(e.tx_hash),
            Self::AdapterSplit(e) => Some(e.tx_hash),
            Self::AdapterMerge(e) => Some(e.tx_hash),
            Self::AdapterRedemption(e) => Some(e.tx_hash),
            Self::AdapterConversion(e) => Some(e.tx_hash),
            Self::Transfer(e) => Some(e.tx_hash),
            Self::FeeRefund(e) | Self::FeeWithdrawal(e) => Some(e.tx_hash),
            Self::Resolution(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderedEvent {
    pub key: EventKey,
    pub event: ChainEvent,
}
