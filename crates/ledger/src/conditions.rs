//! In-memory view of market definitions: outcome slot counts, payout
//! vectors and the derived outcome-token tuple per condition.

use {
    crate::tokens,
    alloy_primitives::{Address, B256, U256},
    number::conversions::u256_to_f64,
    std::collections::{BTreeMap, HashMap},
};

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub id: B256,
    pub oracle: Address,
    pub outcome_slot_count: u32,
    pub parent_collection_id: B256,
    pub collateral_token: Address,
    /// Empty while unresolved.
    pub payout_numerators: Vec<U256>,
    pub payout_denominator: U256,
    /// Zero while unresolved.
    pub resolved_at: i64,
    pub resolved_block: i64,
}

impl Condition {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at > 0
    }

    /// Collateral paid per token of outcome `index`. Zero for unresolved
    /// conditions and out-of-range indices.
    pub fn payout_ratio(&self, index: usize) -> f64 {
        if self.payout_denominator.is_zero() {
            return 0.0;
        }
        let Some(numerator) = self.payout_numerators.get(index) else {
            return 0.0;
        };
        u256_to_f64(*numerator) / u256_to_f64(self.payout_denominator)
    }

    fn strip_resolution(mut self) -> Self {
        self.payout_numerators = Vec::new();
        self.payout_denominator = U256::ZERO;
        self.resolved_at = 0;
        self.resolved_block = 0;
        self
    }
}

/// Catalog over all conditions, bounded by the replay's end time: a
/// condition resolved after the bound is presented unresolved, so a
/// historical replay never sees a resolution from its future.
#[derive(Clone, Debug, Default)]
pub struct ConditionCatalog {
    conditions: BTreeMap<B256, Condition>,
    outcome_tokens: HashMap<B256, Vec<U256>>,
    token_index: HashMap<U256, (B256, usize)>,
}

impl ConditionCatalog {
    pub fn new(conditions: Vec<Condition>, end_ts: Option<i64>) -> Self {
        let mut catalog = Self::default();
        for condition in conditions {
            let condition = match end_ts {
                Some(end) if condition.resolved_at > end => condition.strip_resolution(),
                _ => condition,
            };
            let tokens: Vec<U256> = (0..condition.outcome_slot_count as usize)
                .map(|index| {
                    tokens::outcome_token(
                        condition.parent_collection_id,
                        condition.id,
                        index,
                        condition.collateral_token,
                    )
                })
                .collect();
            for (index, token) in tokens.iter().enumerate() {
                catalog.token_index.insert(*token, (condition.id, index));
            }
            catalog.outcome_tokens.insert(condition.id, tokens);
            catalog.conditions.insert(condition.id, condition);
        }
        catalog
    }

    pub fn condition(&self, id: &B256) -> Option<&Condition> {
        self.conditions.get(id)
    }

    /// Derived outcome-token tuple, one id per outcome index.
    pub fn outcome_tokens(&self, id: &B256) -> Option<&[U256]> {
        self.outcome_tokens.get(id).map(Vec::as_slice)
    }

    /// Reverse lookup: which `(condition, outcome index)` a token id
    /// belongs to.
    pub fn token_position(&self, token_id: U256) -> Option<(B256, usize)> {
        self.token_index.get(&token_id).copied()
    }

    pub fn payout_ratios(&self, id: &B256) -> Vec<f64> {
        self.condition(id)
            .map(|condition| {
                (0..condition.outcome_slot_count as usize)
                    .map(|index| condition.payout_ratio(index))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolved conditions in id order, the source of synthetic resolution
    /// events.
    pub fn resolved(&self) -> impl Iterator<Item = &Condition> {
        self.conditions
            .values()
            .filter(|condition| condition.is_resolved())
    }
}
