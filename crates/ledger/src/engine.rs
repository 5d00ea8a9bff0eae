//! The replay state machine. Consumes one wallet's unified event stream in
//! order, mutates the FIFO inventory, and emits ledger entries, realized
//! sub-events and snapshots.
//!
//! Anomalies in the source data (consuming from an empty bucket, a
//! condition missing from the catalog, a zero-quantity basket) degrade to
//! documented best-effort accounting and never abort the replay.

use {
    crate::{
        conditions::ConditionCatalog,
        entry::{EntryKind, LedgerEntry, RealizedEvent, RealizedKind, Snapshot},
        events::{
            AdapterConversion, AdapterMerge, AdapterRedemption, AdapterSplit, ChainEvent,
            EventKey, FeePayout, Merge, OrderedEvent, Redemption, Resolution, Split, Trade,
            TradeRole, Transfer,
        },
        inventory::{Consumed, Inventory, QUANTITY_EPSILON},
        snapshot::Snapshotter,
        tokens::{self, NegRiskRegistry},
    },
    alloy_primitives::{Address, B256, U256},
    number::units::{collateral_as_outcome_scalar, collateral_scalar, outcome_scalar},
    serde_json::json,
    std::collections::{BTreeMap, HashMap},
};

#[derive(Clone, Debug)]
pub struct ReplayParams {
    pub wallet: Address,
    /// Snapshot cadence in seconds; zero disables snapshots.
    pub snapshot_interval: i64,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
}

/// Same-transaction ERC-1155 legs, grouped by transaction. The unified
/// stream drops the raw transfers that belong to bookkeeping transactions,
/// so the handlers look the token movements up here instead.
#[derive(Clone, Debug, Default)]
pub struct TxLegs {
    mints: HashMap<B256, Vec<(U256, U256)>>,
    burns: HashMap<B256, Vec<(U256, U256)>>,
}

impl TxLegs {
    pub fn from_transfers<'a>(
        wallet: Address,
        transfers: impl IntoIterator<Item = &'a Transfer>,
    ) -> Self {
        let mut legs = Self::default();
        for transfer in transfers {
            if transfer.from == transfer.to {
                continue;
            }
            if transfer.to == wallet {
                legs.mints
                    .entry(transfer.tx_hash)
                    .or_default()
                    .push((transfer.token_id, transfer.value));
            }
            if transfer.from == wallet {
                legs.burns
                    .entry(transfer.tx_hash)
                    .or_default()
                    .push((transfer.token_id, transfer.value));
            }
        }
        legs
    }

    fn mints(&self, tx_hash: &B256) -> &[(U256, U256)] {
        self.mints.get(tx_hash).map(Vec::as_slice).unwrap_or(&[])
    }

    fn burns(&self, tx_hash: &B256) -> &[(U256, U256)] {
        self.burns.get(tx_hash).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReplayOutput {
    pub entries: Vec<LedgerEntry>,
    pub realized: Vec<RealizedEvent>,
    pub snapshots: Vec<Snapshot>,
    pub inventory: Inventory,
    pub last_prices: HashMap<U256, f64>,
    pub events_processed: usize,
}

pub struct Replay<'a> {
    params: ReplayParams,
    catalog: &'a ConditionCatalog,
    legs: &'a TxLegs,
    neg_risk: &'a NegRiskRegistry,
    inventory: Inventory,
    last_prices: HashMap<U256, f64>,
    entries: Vec<LedgerEntry>,
    realized: Vec<RealizedEvent>,
    snapshots: Vec<Snapshot>,
    snapshotter: Snapshotter,
    realized_cum: f64,
    cashflow_cum: f64,
    last_event_ts: Option<i64>,
    events_processed: usize,
}

impl<'a> Replay<'a> {
    pub fn new(
        params: ReplayParams,
        catalog: &'a ConditionCatalog,
        legs: &'a TxLegs,
        neg_risk: &'a NegRiskRegistry,
    ) -> Self {
        let snapshotter = Snapshotter::new(params.snapshot_interval, params.start_ts);
        Self {
            params,
            catalog,
            legs,
            neg_risk,
            inventory: Inventory::default(),
            last_prices: HashMap::new(),
            entries: Vec::new(),
            realized: Vec::new(),
            snapshots: Vec::new(),
            snapshotter,
            realized_cum: 0.0,
            cashflow_cum: 0.0,
            last_event_ts: None,
            events_processed: 0,
        }
    }

    pub fn run(mut self, events: impl IntoIterator<Item = OrderedEvent>) -> ReplayOutput {
        for OrderedEvent { key, event } in events {
            while let Some(at) = self.snapshotter.due(key.timestamp) {
                self.push_snapshot(at);
            }
            self.handle(key, event);
            self.last_event_ts = Some(key.timestamp);
            self.events_processed += 1;
        }
        if let Some(at) = self
            .snapshotter
            .final_boundary(self.params.end_ts, self.last_event_ts)
        {
            self.push_snapshot(at);
        }
        ReplayOutput {
            entries: self.entries,
            realized: self.realized,
            snapshots: self.snapshots,
            inventory: self.inventory,
            last_prices: self.last_prices,
            events_processed: self.events_processed,
        }
    }

    fn handle(&mut self, key: EventKey, event: ChainEvent) {
        match event {
            ChainEvent::Trade(trade) => self.handle_trade(key, trade),
            ChainEvent::Split(split) => self.handle_split(key, split),
            ChainEvent::Merge(merge) => self.handle_merge(key, merge),
            ChainEvent::Redemption(redemption) => self.handle_redemption(key, redemption),
            ChainEvent::AdapterSplit(split) => self.handle_adapter_split(key, split),
            ChainEvent::AdapterMerge(merge) => self.handle_adapter_merge(key, merge),
            ChainEvent::AdapterRedemption(redemption) => {
                self.handle_adapter_redemption(key, redemption)
            }
            ChainEvent::AdapterConversion(conversion) => self.handle_conversion(key, conversion),
            ChainEvent::Transfer(transfer) => self.handle_transfer(key, transfer),
            ChainEvent::FeeRefund(fee) => self.handle_fee(key, EntryKind::FeeRefund, fee),
            ChainEvent::FeeWithdrawal(fee) => self.handle_fee(key, EntryKind::FeeWithdrawal, fee),
            ChainEvent::Resolution(resolution) => self.handle_resolution(key, resolution),
        }
    }

    fn handle_trade(&mut self, key: EventKey, trade: Trade) {
        let quantity = outcome_scalar(trade.token_amount);
        let mut entry = self.entry(
            key,
            if trade.is_buy {
                EntryKind::TradeBuy
            } else {
                EntryKind::TradeSell
            },
            trade.tx_hash,
        );
        entry.id = format!(
            "{}:{}:{}:{}",
            trade.tx_hash,
            key.log_index,
            entry.kind,
            trade.role.as_str()
        );
        entry.token_id = Some(trade.token_id);
        entry.quantity = quantity;
        entry.metadata = json!({ "role": trade.role.as_str() });

        if trade.is_buy {
            let usd = collateral_scalar(trade.usdc_amount);
            let unit_price = safe_div(usd, quantity);
            if quantity > QUANTITY_EPSILON {
                self.inventory
                    .add(trade.token_id, quantity, unit_price, key.timestamp);
                self.last_prices.insert(trade.token_id, unit_price);
            }
            entry.cash_delta = -usd;
            entry.unit_price = unit_price;
            entry.cost_basis = usd;
        } else {
            // fee comes off the proceeds while still in raw units
            let proceeds = collateral_scalar(trade.usdc_amount.saturating_sub(trade.fee));
            let unit_price = safe_div(proceeds, quantity);
            let consumed = self.consume_logged(trade.token_id, quantity);
            self.push_realizations(
                RealizedKind::Sell,
                key.timestamp,
                trade.token_id,
                unit_price,
                &consumed,
            );
            if quantity > QUANTITY_EPSILON {
                self.last_prices.insert(trade.token_id, unit_price);
            } else if proceeds != 0.0 {
                // degenerate fill: proceeds with no tokens moved still have
                // to show up in the realized sums
                self.realized.push(RealizedEvent {
                    kind: RealizedKind::Sell,
                    at: key.timestamp,
                    opened_at: None,
                    token_id: Some(trade.token_id),
                    proceeds,
                    cost_basis: 0.0,
                    realized_pnl: proceeds,
                });
            }
            entry.cash_delta = proceeds;
            entry.unit_price = unit_price;
            entry.cost_basis = consumed.cost_basis;
            entry.realized_pnl = proceeds - consumed.cost_basis;
            entry.entry_timestamp = weighted_opened_at(&consumed, key.timestamp);
        }
        self.push_entry(entry);
    }

    fn handle_split(&mut self, key: EventKey, split: Split) {
        let cost = collateral_scalar(split.amount);
        let candidates = self.condition_tokens(
            split.parent_collection_id,
            split.condition_id,
            split.collateral,
            Some(&split.partition),
        );
        let mut minted = legs_by_token(self.legs.mints(&split.tx_hash), &candidates);
        if minted.is_empty() {
            // bookkeeping-only split: each index set of the partition mints
            // the collateral amount at its outcome index
            minted = split
                .partition
                .iter()
                .map(|index_set| {
                    let index = index_set.trailing_zeros();
                    let token = tokens::outcome_token(
                        split.parent_collection_id,
                        split.condition_id,
                        index,
                        split.collateral,
                    );
                    (token, collateral_as_outcome_scalar(split.amount))
                })
                .collect();
        }
        self.apply_basket_mint(
            key,
            EntryKind::Split,
            split.tx_hash,
            split.condition_id,
            cost,
            &minted,
            json!({ "partition": decimal_strings(&split.partition) }),
        );
    }

    fn handle_merge(&mut self, key: EventKey, merge: Merge) {
        let proceeds = collateral_scalar(merge.amount);
        let candidates = self.condition_tokens(
            merge.parent_collection_id,
            merge.condition_id,
            merge.collateral,
            Some(&merge.partition),
        );
        let mut burned = legs_by_token(self.legs.burns(&merge.tx_hash), &candidates);
        if burned.is_empty() {
            // no burn legs recorded: assume the partition's basket burned
            burned = candidates
                .iter()
                .map(|(_, token)| (*token, collateral_as_outcome_scalar(merge.amount)))
                .collect();
        }
        self.apply_basket_burn(
            key,
            EntryKind::Merge,
            merge.tx_hash,
            merge.condition_id,
            proceeds,
            &burned,
            json!({ "partition": decimal_strings(&merge.partition) }),
        );
    }

    fn handle_redemption(&mut self, key: EventKey, redemption: Redemption) {
        let candidates = self.condition_tokens(
            redemption.parent_collection_id,
            redemption.condition_id,
            redemption.collateral,
            Some(&redemption.index_sets),
        );
        let mut burned = indexed_legs(self.legs.burns(&redemption.tx_hash), &candidates);
        if burned.is_empty() {
            // no burn legs: the redeemer turned in everything they held of
            // the named index sets
            burned = redemption
                .index_sets
                .iter()
                .filter_map(|index_set| {
                    let index = index_set.trailing_zeros();
                    let (_, token) = candidates
                        .iter()
                        .find(|(candidate_index, _)| *candidate_index == index)?;
                    let quantity = self.inventory.total_quantity(*token);
                    (quantity > QUANTITY_EPSILON).then_some((index, *token, quantity))
                })
                .collect();
        }
        self.apply_redemption(
            key,
            EntryKind::Redemption,
            redemption.tx_hash,
            redemption.condition_id,
            burned,
            collateral_scalar(redemption.payout),
            json!({ "index_sets": decimal_strings(&redemption.index_sets) }),
        );
    }

    fn handle_adapter_split(&mut self, key: EventKey, split: AdapterSplit) {
        let cost = collateral_scalar(split.amount);
        let candidates = self.adapter_pair(split.condition_id);
        let mut minted = legs_by_token(self.legs.mints(&split.tx_hash), &candidates);
        if minted.is_empty() {
            minted = candidates
                .iter()
                .map(|(_, token)| (*token, collateral_as_outcome_scalar(split.amount)))
                .collect();
        }
        self.apply_basket_mint(
            key,
            EntryKind::AdapterSplit,
            split.tx_hash,
            split.condition_id,
            cost,
            &minted,
            serde_json::Value::Null,
        );
    }

    fn handle_adapter_merge(&mut self, key: EventKey, merge: AdapterMerge) {
        let proceeds = collateral_scalar(merge.amount);
        let candidates = self.adapter_pair(merge.condition_id);
        let mut burned = legs_by_token(self.legs.burns(&merge.tx_hash), &candidates);
        if burned.is_empty() {
            burned = candidates
                .iter()
                .map(|(_, token)| (*token, collateral_as_outcome_scalar(merge.amount)))
                .collect();
        }
        self.apply_basket_burn(
            key,
            EntryKind::AdapterMerge,
            merge.tx_hash,
            merge.condition_id,
            proceeds,
            &burned,
            serde_json::Value::Null,
        );
    }

    fn handle_adapter_redemption(&mut self, key: EventKey, redemption: AdapterRedemption) {
        let candidates = self.adapter_pair(redemption.condition_id);
        let mut burned = indexed_legs(self.legs.burns(&redemption.tx_hash), &candidates);
        if burned.is_empty() {
            // the adapter event names the burned amount per outcome index
            burned = candidates
                .iter()
                .filter_map(|(index, token)| {
                    let quantity = redemption
                        .amounts
                        .get(*index)
                        .copied()
                        .map(outcome_scalar)?;
                    (quantity > QUANTITY_EPSILON).then_some((*index, *token, quantity))
                })
                .collect();
        }
        if burned.is_empty() {
            burned = candidates
                .iter()
                .filter_map(|(index, token)| {
                    let quantity = self.inventory.total_quantity(*token);
                    (quantity > QUANTITY_EPSILON).then_some((*index, *token, quantity))
                })
                .collect();
        }
        self.apply_redemption(
            key,
            EntryKind::AdapterRedemption,
            redemption.tx_hash,
            redemption.condition_id,
            burned,
            collateral_scalar(redemption.payout),
            serde_json::Value::Null,
        );
    }

    /// Conversion swaps NO positions on the index-set questions for YES
    /// positions on the remaining questions of the market. Pure basis
    /// shift, realizes nothing.
    fn handle_conversion(&mut self, key: EventKey, conversion: AdapterConversion) {
        let mut burned = aggregate_legs(self.legs.burns(&conversion.tx_hash));
        let mut minted = aggregate_legs(self.legs.mints(&conversion.tx_hash));
        if burned.is_empty() && minted.is_empty() {
            match self.neg_risk.question_count(&conversion.market_id) {
                Some(count) => {
                    let quantity = outcome_scalar(conversion.amount);
                    for question in 0..count.min(u8::MAX as u32) {
                        let (yes, no) = self
                            .neg_risk
                            .question_tokens(conversion.market_id, question as u8);
                        if conversion.index_set.bit(question as usize) {
                            burned.push((no, quantity));
                        } else {
                            minted.push((yes, quantity));
                        }
                    }
                }
                None => tracing::warn!(
                    market = %conversion.market_id,
                    "question count unknown; conversion degrades to a zero-quantity basis shift"
                ),
            }
        }

        let mut cost_basis = 0.0;
        let mut burned_quantity = 0.0;
        for (token, quantity) in &burned {
            cost_basis += self.consume_logged(*token, *quantity).cost_basis;
            burned_quantity += quantity;
        }
        let minted_quantity: f64 = minted.iter().map(|(_, quantity)| quantity).sum();
        if minted_quantity > QUANTITY_EPSILON {
            if cost_basis > 0.0 {
                let unit_cost = cost_basis / minted_quantity;
                for (token, quantity) in &minted {
                    self.inventory
                        .add(*token, *quantity, unit_cost, key.timestamp);
                }
            } else {
                // nothing was paid for the burned side; fall back to the
                // last traded price of each minted token
                for (token, quantity) in &minted {
                    let unit_cost = self.last_prices.get(token).copied().unwrap_or(0.0);
                    self.inventory
                        .add(*token, *quantity, unit_cost, key.timestamp);
                }
            }
        }

        let mut entry = self.entry(key, EntryKind::AdapterConversion, conversion.tx_hash);
        entry.id = format!("{}:{}:{}", conversion.tx_hash, key.log_index, entry.kind);
        entry.quantity = minted_quantity;
        entry.cost_basis = cost_basis;
        entry.unit_price = safe_div(cost_basis, minted_quantity);
        entry.metadata = json!({
            "market_id": conversion.market_id.to_string(),
            "index_set": conversion.index_set.to_string(),
            "burned_quantity": burned_quantity,
        });
        self.push_entry(entry);
    }

    fn handle_transfer(&mut self, key: EventKey, transfer: Transfer) {
        let quantity = outcome_scalar(transfer.value);
        let wallet = self.params.wallet;
        let counterparty = if transfer.from == wallet {
            transfer.to
        } else {
            transfer.from
        };
        let metadata = json!({
            "counterparty": counterparty.to_string(),
            "operator": transfer.operator.to_string(),
        });
        if transfer.from == wallet {
            let kind = if transfer.to == Address::ZERO {
                EntryKind::Burn
            } else {
                EntryKind::TransferOut
            };
            let consumed = self.consume_logged(transfer.token_id, quantity);
            let mut entry = self.entry(key, kind, transfer.tx_hash);
            entry.id = format!("{}:{}:{}", transfer.tx_hash, key.log_index, entry.kind);
            entry.token_id = Some(transfer.token_id);
            entry.quantity = quantity;
            entry.cost_basis = consumed.cost_basis;
            entry.unit_price = safe_div(consumed.cost_basis, quantity);
            entry.metadata = metadata;
            // gifts do not realize
            self.push_entry(entry);
        } else {
            let kind = if transfer.from == Address::ZERO {
                EntryKind::Mint
            } else {
                EntryKind::TransferIn
            };
            // received basis is an approximation: the bucket's current
            // average cost, else the last traded price, else zero
            let unit_cost = self
                .inventory
                .weighted_avg_unit_cost(transfer.token_id)
                .or_else(|| self.last_prices.get(&transfer.token_id).copied())
                .unwrap_or(0.0);
            self.inventory
                .add(transfer.token_id, quantity, unit_cost, key.timestamp);
            let mut entry = self.entry(key, kind, transfer.tx_hash);
            entry.id = format!("{}:{}:{}", transfer.tx_hash, key.log_index, entry.kind);
            entry.token_id = Some(transfer.token_id);
            entry.quantity = quantity;
            entry.cost_basis = quantity * unit_cost;
            entry.unit_price = unit_cost;
            entry.metadata = metadata;
            self.push_entry(entry);
        }
    }

    fn handle_fee(&mut self, key: EventKey, kind: EntryKind, fee: FeePayout) {
        let amount = collateral_scalar(fee.amount);
        let mut entry = self.entry(key, kind, fee.tx_hash);
        entry.id = format!("{}:{}:{}", fee.tx_hash, key.log_index, entry.kind);
        entry.token_id = fee.token_id;
        entry.cash_delta = amount;
        entry.realized_pnl = amount;
        self.realized.push(RealizedEvent {
            kind: RealizedKind::Fee,
            at: key.timestamp,
            opened_at: None,
            token_id: fee.token_id,
            proceeds: amount,
            cost_basis: 0.0,
            realized_pnl: amount,
        });
        self.push_entry(entry);
    }

    /// Liquidates every residual position in outcomes the resolution pays
    /// nothing for. Winning outcomes stay open until the wallet redeems.
    fn handle_resolution(&mut self, key: EventKey, resolution: Resolution) {
        let catalog = self.catalog;
        let Some(outcome_tokens) = catalog.outcome_tokens(&resolution.condition_id) else {
            tracing::warn!(condition = %resolution.condition_id, "resolution for a condition missing from the catalog");
            return;
        };
        let ratios = catalog.payout_ratios(&resolution.condition_id);
        for (index, token) in outcome_tokens.iter().enumerate() {
            if ratios.get(index).copied().unwrap_or(0.0) != 0.0 {
                continue;
            }
            let quantity = self.inventory.total_quantity(*token);
            if quantity <= QUANTITY_EPSILON {
                continue;
            }
            let consumed = self.consume_logged(*token, quantity);
            self.push_realizations(
                RealizedKind::ResolutionLoss,
                key.timestamp,
                *token,
                0.0,
                &consumed,
            );
            let mut entry = self.entry(key, EntryKind::ResolutionLoss, B256::ZERO);
            entry.id = format!(
                "{}:{}:{token:#x}",
                resolution.condition_id, entry.kind
            );
            entry.token_id = Some(*token);
            entry.quantity = quantity;
            entry.cost_basis = consumed.cost_basis;
            entry.realized_pnl = -consumed.cost_basis;
            entry.metadata = json!({ "payout_ratio": 0.0 });
            self.push_entry(entry);
        }
    }

    // shared basket accounting

    fn apply_basket_mint(
        &mut self,
        key: EventKey,
        kind: EntryKind,
        tx_hash: B256,
        condition_id: B256,
        cost: f64,
        minted: &[(U256, f64)],
        metadata: serde_json::Value,
    ) {
        let total_minted: f64 = minted.iter().map(|(_, quantity)| quantity).sum();
        let unit_cost = safe_div(cost, total_minted);
        for (token, quantity) in minted {
            self.inventory.add(*token, *quantity, unit_cost, key.timestamp);
        }
        let mut entry = self.entry(key, kind, tx_hash);
        entry.id = format!("{tx_hash}:{}:{kind}", key.log_index);
        entry.condition_id = Some(condition_id);
        entry.quantity = total_minted;
        entry.cash_delta = -cost;
        entry.unit_price = unit_cost;
        entry.cost_basis = cost;
        entry.metadata = metadata;
        self.push_entry(entry);
    }

    fn apply_basket_burn(
        &mut self,
        key: EventKey,
        kind: EntryKind,
        tx_hash: B256,
        condition_id: B256,
        proceeds: f64,
        burned: &[(U256, f64)],
        metadata: serde_json::Value,
    ) {
        let total_burned: f64 = burned.iter().map(|(_, quantity)| quantity).sum();
        let mut entry = self.entry(key, kind, tx_hash);
        entry.id = format!("{tx_hash}:{}:{kind}", key.log_index);
        entry.condition_id = Some(condition_id);
        entry.cash_delta = proceeds;
        entry.metadata = metadata;

        if total_burned <= QUANTITY_EPSILON {
            // nothing identifiable was burned; keep the cash leg as a
            // zero-quantity row so cashflow and realized sums stay closed
            entry.realized_pnl = proceeds;
            if proceeds != 0.0 {
                self.realized.push(RealizedEvent {
                    kind: RealizedKind::Merge,
                    at: key.timestamp,
                    opened_at: None,
                    token_id: None,
                    proceeds,
                    cost_basis: 0.0,
                    realized_pnl: proceeds,
                });
            }
            self.push_entry(entry);
            return;
        }

        let unit_proceeds = proceeds / total_burned;
        let mut cost_basis = 0.0;
        for (token, quantity) in burned {
            let consumed = self.consume_logged(*token, *quantity);
            cost_basis += consumed.cost_basis;
            self.push_realizations(
                RealizedKind::Merge,
                key.timestamp,
                *token,
                unit_proceeds,
                &consumed,
            );
        }
        entry.quantity = total_burned;
        entry.unit_price = unit_proceeds;
        entry.cost_basis = cost_basis;
        entry.realized_pnl = proceeds - cost_basis;
        self.push_entry(entry);
    }

    fn apply_redemption(
        &mut self,
        key: EventKey,
        kind: EntryKind,
        tx_hash: B256,
        condition_id: B256,
        burned: Vec<(usize, U256, f64)>,
        payout: f64,
        metadata: serde_json::Value,
    ) {
        let ratios = self.catalog.payout_ratios(&condition_id);
        let ratio = |index: usize| ratios.get(index).copied().unwrap_or(0.0);
        let total_quantity: f64 = burned.iter().map(|(_, _, quantity)| quantity).sum();

        let mut entry = self.entry(key, kind, tx_hash);
        entry.id = format!("{tx_hash}:{}:{kind}", key.log_index);
        entry.condition_id = Some(condition_id);
        entry.cash_delta = payout;
        entry.metadata = metadata;

        if total_quantity <= QUANTITY_EPSILON {
            entry.realized_pnl = payout;
            if payout != 0.0 {
                self.realized.push(RealizedEvent {
                    kind: RealizedKind::Redemption,
                    at: key.timestamp,
                    opened_at: None,
                    token_id: None,
                    proceeds: payout,
                    cost_basis: 0.0,
                    realized_pnl: payout,
                });
            }
            self.push_entry(entry);
            return;
        }

        // payouts attribute to tokens in proportion to their payout ratio;
        // when the ratios predict nothing, spread uniformly
        let expected: f64 = burned
            .iter()
            .map(|(index, _, quantity)| quantity * ratio(*index))
            .sum();
        let scale = if expected > 0.0 { payout / expected } else { 0.0 };
        let mut cost_basis = 0.0;
        for (index, token, quantity) in &burned {
            let unit_proceeds = if expected > 0.0 {
                ratio(*index) * scale
            } else {
                payout / total_quantity
            };
            let consumed = self.consume_logged(*token, *quantity);
            cost_basis += consumed.cost_basis;
            self.push_realizations(
                RealizedKind::Redemption,
                key.timestamp,
                *token,
                unit_proceeds,
                &consumed,
            );
        }
        entry.quantity = total_quantity;
        entry.unit_price = safe_div(payout, total_quantity);
        entry.cost_basis = cost_basis;
        entry.realized_pnl = payout - cost_basis;
        self.push_entry(entry);
    }

    // plumbing

    /// `(outcome index, token id)` candidates of a condition, derived from
    /// the event's own fields and scoped to the outcomes its index sets
    /// name. The scoping matters: one transaction can bundle several
    /// partition operations on the same condition, and each event may only
    /// claim the transfer legs of its own outcomes. Falls back to the index
    /// sets at hand when the condition is missing from the catalog.
    fn condition_tokens(
        &self,
        parent_collection_id: B256,
        condition_id: B256,
        collateral: Address,
        index_sets: Option<&[U256]>,
    ) -> Vec<(usize, U256)> {
        if let Some(condition) = self.catalog.condition(&condition_id) {
            (0..condition.outcome_slot_count as usize)
                .filter(|index| {
                    index_sets.is_none_or(|sets| sets.iter().any(|set| set.bit(*index)))
                })
                .map(|index| {
                    (
                        index,
                        tokens::outcome_token(parent_collection_id, condition_id, index, collateral),
                    )
                })
                .collect()
        } else {
            tracing::warn!(condition = %condition_id, "condition missing from the catalog");
            index_sets
                .unwrap_or(&[])
                .iter()
                .map(|index_set| {
                    let index = index_set.trailing_zeros();
                    (
                        index,
                        tokens::outcome_token(parent_collection_id, condition_id, index, collateral),
                    )
                })
                .collect()
        }
    }

    /// `(yes, no)` of a binary adapter condition as an indexed candidate
    /// list.
    fn adapter_pair(&self, condition_id: B256) -> Vec<(usize, U256)> {
        let (yes, no) = self.neg_risk.pair_tokens(condition_id);
        vec![(0, yes), (1, no)]
    }

    fn consume_logged(&mut self, token_id: U256, quantity: f64) -> Consumed {
        let consumed = self.inventory.consume(token_id, quantity);
        if consumed.shortfall > QUANTITY_EPSILON {
            tracing::warn!(
                token = format!("{token_id:#x}"),
                shortfall = consumed.shortfall,
                "consumption exceeds recorded inventory; missing quantity carries zero basis"
            );
        }
        consumed
    }

    /// One realized sub-event per consumed lot, plus a zero-basis one for
    /// any shortfall, so the sub-event sums always match the ledger entry.
    fn push_realizations(
        &mut self,
        kind: RealizedKind,
        at: i64,
        token_id: U256,
        unit_proceeds: f64,
        consumed: &Consumed,
    ) {
        for lot in &consumed.lots {
            let proceeds = lot.quantity * unit_proceeds;
            let cost_basis = lot.quantity * lot.unit_cost;
            self.realized.push(RealizedEvent {
                kind,
                at,
                opened_at: Some(lot.opened_at),
                token_id: Some(token_id),
                proceeds,
                cost_basis,
                realized_pnl: proceeds - cost_basis,
            });
        }
        if consumed.shortfall > QUANTITY_EPSILON {
            let proceeds = consumed.shortfall * unit_proceeds;
            self.realized.push(RealizedEvent {
                kind,
                at,
                opened_at: None,
                token_id: Some(token_id),
                proceeds,
                cost_basis: 0.0,
                realized_pnl: proceeds,
            });
        }
    }

    fn entry(&self, key: EventKey, kind: EntryKind, tx_hash: B256) -> LedgerEntry {
        LedgerEntry {
            id: String::new(),
            wallet: self.params.wallet,
            kind,
            tx_hash,
            log_index: key.log_index,
            block_number: key.block_number,
            timestamp: key.timestamp,
            token_id: None,
            condition_id: None,
            quantity: 0.0,
            cash_delta: 0.0,
            unit_price: 0.0,
            cost_basis: 0.0,
            realized_pnl: 0.0,
            entry_timestamp: key.timestamp,
            metadata: serde_json::Value::Null,
        }
    }

    fn push_entry(&mut self, entry: LedgerEntry) {
        self.realized_cum += entry.realized_pnl;
        self.cashflow_cum += entry.cash_delta;
        self.entries.push(entry);
    }

    fn push_snapshot(&mut self, at: i64) {
        let open_cost = self.inventory.open_cost(None);
        let open_value = self.inventory.open_value(&self.last_prices, None);
        self.snapshots.push(Snapshot {
            wallet: self.params.wallet,
            at,
            realized_cum: self.realized_cum,
            unrealized: open_value - open_cost,
            open_cost,
            open_value,
            cashflow_cum: self.cashflow_cum,
            open_token_count: self.inventory.open_token_count() as i64,
        });
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() { value } else { 0.0 }
}

/// Quantity-weighted mean `opened_at` of a consumption; shortfall weighs in
/// at the event time.
fn weighted_opened_at(consumed: &Consumed, event_ts: i64) -> i64 {
    let total: f64 =
        consumed.lots.iter().map(|lot| lot.quantity).sum::<f64>() + consumed.shortfall;
    if total <= QUANTITY_EPSILON {
        return event_ts;
    }
    let weighted: f64 = consumed
        .lots
        .iter()
        .map(|lot| lot.quantity * lot.opened_at as f64)
        .sum::<f64>()
        + consumed.shortfall * event_ts as f64;
    (weighted / total).round() as i64
}

/// Sums raw legs per candidate token, preserving candidate (outcome index)
/// order.
fn legs_by_token(legs: &[(U256, U256)], candidates: &[(usize, U256)]) -> Vec<(U256, f64)> {
    indexed_legs(legs, candidates)
        .into_iter()
        .map(|(_, token, quantity)| (token, quantity))
        .collect()
}

fn indexed_legs(legs: &[(U256, U256)], candidates: &[(usize, U256)]) -> Vec<(usize, U256, f64)> {
    candidates
        .iter()
        .filter_map(|(index, candidate)| {
            let quantity: f64 = legs
                .iter()
                .filter(|(token, _)| token == candidate)
                .map(|(_, value)| outcome_scalar(*value))
                .sum();
            (quantity > QUANTITY_EPSILON).then_some((*index, *candidate, quantity))
        })
        .collect()
}

/// Sums arbitrary legs per token in token order.
fn aggregate_legs(legs: &[(U256, U256)]) -> Vec<(U256, f64)> {
    let mut by_token: BTreeMap<U256, f64> = BTreeMap::new();
    for (token, value) in legs {
        *by_token.entry(*token).or_default() += outcome_scalar(*value);
    }
    by_token
        .into_iter()
        .filter(|(_, quantity)| *quantity > QUANTITY_EPSILON)
        .collect()
}

fn decimal_strings(values: &[U256]) -> Vec<String> {
    values.iter().map(U256::to_string).collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            conditions::{Condition, ConditionCatalog},
            events::{EventTag, RESOLUTION_LOG_INDEX},
        },
        maplit::hashmap,
    };

    const WALLET: Address = Address::repeat_byte(0xaa);
    const COLLATERAL: Address = Address::repeat_byte(0xcc);
    const WRAPPED: Address = Address::repeat_byte(0xdd);
    const ADAPTER: Address = Address::repeat_byte(0xad);
    const TOKEN: U256 = U256::from_limbs([42, 0, 0, 0]);
    const CONDITION: B256 = B256::repeat_byte(0x11);

    fn tokens18(quantity: u64) -> U256 {
        U256::from(quantity) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn key(timestamp: i64, log_index: i64, tag: EventTag) -> EventKey {
        EventKey {
            timestamp,
            block_number: timestamp / 100,
            log_index,
            tag,
        }
    }

    fn buy(ts: i64, token_id: U256, usdc_raw: u64, quantity: u64) -> OrderedEvent {
        OrderedEvent {
            key: key(ts, 0, EventTag::Trade),
            event: ChainEvent::Trade(Trade {
                tx_hash: B256::with_last_byte(ts as u8),
                token_id,
                usdc_amount: U256::from(usdc_raw),
                token_amount: tokens18(quantity),
                fee: U256::ZERO,
                is_buy: true,
                role: TradeRole::Taker,
            }),
        }
    }

    fn sell(ts: i64, token_id: U256, usdc_raw: u64, quantity: u64, fee_raw: u64) -> OrderedEvent {
        OrderedEvent {
            key: key(ts, 0, EventTag::Trade),
            event: ChainEvent::Trade(Trade {
                tx_hash: B256::with_last_byte(ts as u8),
                token_id,
                usdc_amount: U256::from(usdc_raw),
                token_amount: tokens18(quantity),
                fee: U256::from(fee_raw),
                is_buy: false,
                role: TradeRole::Maker,
            }),
        }
    }

    fn split(ts: i64, condition_id: B256, amount_raw: u64) -> OrderedEvent {
        OrderedEvent {
            key: key(ts, 0, EventTag::Split),
            event: ChainEvent::Split(Split {
                tx_hash: B256::with_last_byte(ts as u8),
                collateral: COLLATERAL,
                parent_collection_id: B256::ZERO,
                condition_id,
                partition: vec![U256::from(1u8), U256::from(2u8)],
                amount: U256::from(amount_raw),
            }),
        }
    }

    fn resolution(ts: i64, condition_id: B256) -> OrderedEvent {
        OrderedEvent {
            key: EventKey {
                timestamp: ts,
                block_number: ts / 100,
                log_index: RESOLUTION_LOG_INDEX,
                tag: EventTag::Resolution,
            },
            event: ChainEvent::Resolution(Resolution { condition_id }),
        }
    }

    fn fee_refund(ts: i64, amount_raw: u64) -> OrderedEvent {
        OrderedEvent {
            key: key(ts, 0, EventTag::FeeRefund),
            event: ChainEvent::FeeRefund(FeePayout {
                tx_hash: B256::with_last_byte(ts as u8),
                token_id: None,
                amount: U256::from(amount_raw),
            }),
        }
    }

    fn resolved_binary(condition_id: B256, resolved_at: i64) -> Condition {
        Condition {
            id: condition_id,
            oracle: Address::ZERO,
            outcome_slot_count: 2,
            parent_collection_id: B256::ZERO,
            collateral_token: COLLATERAL,
            payout_numerators: vec![U256::from(1u8), U256::ZERO],
            payout_denominator: U256::from(1u8),
            resolved_at,
            resolved_block: resolved_at / 100,
        }
    }

    fn registry() -> NegRiskRegistry {
        NegRiskRegistry::new(ADAPTER, WRAPPED, HashMap::new())
    }

    fn params(snapshot_interval: i64, end_ts: Option<i64>) -> ReplayParams {
        ReplayParams {
            wallet: WALLET,
            snapshot_interval,
            start_ts: None,
            end_ts,
        }
    }

    fn run(events: Vec<OrderedEvent>, catalog: &ConditionCatalog) -> ReplayOutput {
        let legs = TxLegs::default();
        let neg_risk = registry();
        Replay::new(params(0, None), catalog, &legs, &neg_risk).run(events)
    }

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-9, "{left} != {right}");
    }

    #[test]
    fn buy_opens_a_lot_at_the_traded_price() {
        let catalog = ConditionCatalog::default();
        let output = run(vec![buy(100, TOKEN, 50_000_000, 100)], &catalog);

        let entry = &output.entries[0];
        assert_eq!(entry.kind, EntryKind::TradeBuy);
        assert_eq!(entry.quantity, 100.0);
        assert_eq!(entry.cash_delta, -50.0);
        assert_eq!(entry.cost_basis, 50.0);
        assert_eq!(entry.unit_price, 0.5);
        assert_eq!(entry.realized_pnl, 0.0);
        assert!(output.realized.is_empty());
        assert_eq!(output.inventory.total_quantity(TOKEN), 100.0);
        assert_eq!(output.inventory.weighted_avg_unit_cost(TOKEN), Some(0.5));
        assert_eq!(output.last_prices[&TOKEN], 0.5);
    }

    #[test]
    fn partial_sell_realizes_against_fifo_basis() {
        let catalog = ConditionCatalog::default();
        let output = run(
            vec![
                buy(100, TOKEN, 50_000_000, 100),
                sell(200, TOKEN, 28_000_000, 40, 0),
            ],
            &catalog,
        );

        let entry = &output.entries[1];
        assert_eq!(entry.kind, EntryKind::TradeSell);
        assert_eq!(entry.cash_delta, 28.0);
        assert_eq!(entry.cost_basis, 20.0);
        assert_eq!(entry.realized_pnl, 8.0);
        assert_eq!(entry.unit_price, 0.7);
        // the whole consumption came from the lot opened at t=100
        assert_eq!(entry.entry_timestamp, 100);
        assert_eq!(output.inventory.total_quantity(TOKEN), 60.0);
        assert_eq!(output.inventory.weighted_avg_unit_cost(TOKEN), Some(0.5));

        assert_eq!(output.realized.len(), 1);
        let realized = &output.realized[0];
        assert_eq!(realized.kind, RealizedKind::Sell);
        assert_eq!(realized.opened_at, Some(100));
        assert_close(realized.proceeds, 28.0);
        assert_close(realized.cost_basis, 20.0);
        assert_close(realized.realized_pnl, 8.0);
    }

    #[test]
    fn sell_fee_comes_off_raw_proceeds() {
        let catalog = ConditionCatalog::default();
        let output = run(
            vec![
                buy(100, TOKEN, 50_000_000, 100),
                sell(200, TOKEN, 28_000_000, 40, 1_000_000),
            ],
            &catalog,
        );
        let entry = &output.entries[1];
        assert_eq!(entry.cash_delta, 27.0);
        assert_eq!(entry.realized_pnl, 7.0);
    }

    #[test]
    fn split_without_legs_mints_the_partition_at_pro_rata_cost() {
        let catalog = ConditionCatalog::new(vec![resolved_binary(CONDITION, 400)], None);
        let output = run(vec![split(100, CONDITION, 10_000_000)], &catalog);

        let entry = &output.entries[0];
        assert_eq!(entry.kind, EntryKind::Split);
        assert_eq!(entry.quantity, 20.0);
        assert_eq!(entry.cash_delta, -10.0);
        assert_eq!(entry.cost_basis, 10.0);
        assert_eq!(entry.unit_price, 0.5);
        assert_eq!(entry.realized_pnl, 0.0);

        let tokens = catalog.outcome_tokens(&CONDITION).unwrap();
        assert_eq!(output.inventory.total_quantity(tokens[0]), 10.0);
        assert_eq!(output.inventory.total_quantity(tokens[1]), 10.0);
        assert_eq!(output.inventory.weighted_avg_unit_cost(tokens[1]), Some(0.5));
    }

    #[test]
    fn split_prefers_same_tx_mint_legs() {
        let catalog = ConditionCatalog::new(vec![resolved_binary(CONDITION, 400)], None);
        let tokens = catalog.outcome_tokens(&CONDITION).unwrap().to_vec();
        let split_event = split(100, CONDITION, 10_000_000);
        let tx_hash = split_event.event.tx_hash().unwrap();
        let legs = TxLegs::from_transfers(
            WALLET,
            [&Transfer {
                tx_hash,
                operator: Address::ZERO,
                from: Address::ZERO,
                to: WALLET,
                token_id: tokens[0],
                value: tokens18(10),
            }],
        );
        let neg_risk = registry();
        let output =
            Replay::new(params(0, None), &catalog, &legs, &neg_risk).run(vec![split_event]);

        // only the observed leg minted, carrying the whole cost
        assert_eq!(output.entries[0].quantity, 10.0);
        assert_eq!(output.entries[0].unit_price, 1.0);
        assert_eq!(output.inventory.total_quantity(tokens[0]), 10.0);
        assert_eq!(output.inventory.total_quantity(tokens[1]), 0.0);
    }

    #[test]
    fn resolution_liquidates_only_the_losing_outcome() {
        let catalog = ConditionCatalog::new(vec![resolved_binary(CONDITION, 400)], None);
        let tokens = catalog.outcome_tokens(&CONDITION).unwrap().to_vec();
        let output = run(
            vec![split(100, CONDITION, 10_000_000), resolution(400, CONDITION)],
            &catalog,
        );

        let loss = output
            .entries
            .iter()
            .find(|entry| entry.kind == EntryKind::ResolutionLoss)
            .unwrap();
        assert_eq!(loss.token_id, Some(tokens[1]));
        assert_eq!(loss.quantity, 10.0);
        assert_eq!(loss.cash_delta, 0.0);
        assert_eq!(loss.cost_basis, 5.0);
        assert_eq!(loss.realized_pnl, -5.0);

        // the winning outcome stays open until redeemed
        assert_eq!(output.inventory.total_quantity(tokens[0]), 10.0);
        assert_eq!(output.inventory.total_quantity(tokens[1]), 0.0);

        let realized = output
            .realized
            .iter()
            .find(|event| event.kind == RealizedKind::ResolutionLoss)
            .unwrap();
        assert_eq!(realized.opened_at, Some(100));
        assert_close(realized.realized_pnl, -5.0);
    }

    #[test]
    fn redemption_consumes_the_winning_outcome() {
        let catalog = ConditionCatalog::new(vec![resolved_binary(CONDITION, 400)], None);
        let tokens = catalog.outcome_tokens(&CONDITION).unwrap().to_vec();
        let redemption = OrderedEvent {
            key: key(500, 0, EventTag::Redemption),
            event: ChainEvent::Redemption(Redemption {
                tx_hash: B256::with_last_byte(99),
                collateral: COLLATERAL,
                parent_collection_id: B256::ZERO,
                condition_id: CONDITION,
                index_sets: vec![U256::from(1u8)],
                payout: U256::from(10_000_000u64),
            }),
        };
        let output = run(
            vec![
                split(100, CONDITION, 10_000_000),
                resolution(400, CONDITION),
                redemption,
            ],
            &catalog,
        );

        let entry = output
            .entries
            .iter()
            .find(|entry| entry.kind == EntryKind::Redemption)
            .unwrap();
        assert_eq!(entry.quantity, 10.0);
        assert_eq!(entry.cash_delta, 10.0);
        assert_eq!(entry.cost_basis, 5.0);
        assert_eq!(entry.realized_pnl, 5.0);

        // nothing of the condition remains
        assert_eq!(output.inventory.total_quantity(tokens[0]), 0.0);
        assert_eq!(output.inventory.total_quantity(tokens[1]), 0.0);
    }

    #[test]
    fn same_tx_legs_scope_to_the_events_own_index_sets() {
        // one multicall bundles a redemption of outcome 0 and a merge of
        // outcome 1 on the same condition; each event may only claim the
        // burn legs of the outcomes its index sets name
        let condition = Condition {
            id: CONDITION,
            oracle: Address::ZERO,
            outcome_slot_count: 3,
            parent_collection_id: B256::ZERO,
            collateral_token: COLLATERAL,
            payout_numerators: vec![U256::from(1u8), U256::ZERO, U256::ZERO],
            payout_denominator: U256::from(1u8),
            resolved_at: 400,
            resolved_block: 4,
        };
        let catalog = ConditionCatalog::new(vec![condition], None);
        let tokens = catalog.outcome_tokens(&CONDITION).unwrap().to_vec();

        let tx_hash = B256::repeat_byte(0x99);
        let burn = |token_id| Transfer {
            tx_hash,
            operator: WALLET,
            from: WALLET,
            to: Address::ZERO,
            token_id,
            value: tokens18(10),
        };
        let legs = TxLegs::from_transfers(WALLET, [&burn(tokens[0]), &burn(tokens[1])]);

        let redemption = OrderedEvent {
            key: key(500, 0, EventTag::Redemption),
            event: ChainEvent::Redemption(Redemption {
                tx_hash,
                collateral: COLLATERAL,
                parent_collection_id: B256::ZERO,
                condition_id: CONDITION,
                index_sets: vec![U256::from(1u8)],
                payout: U256::from(10_000_000u64),
            }),
        };
        let merge = OrderedEvent {
            key: key(500, 1, EventTag::Merge),
            event: ChainEvent::Merge(Merge {
                tx_hash,
                collateral: COLLATERAL,
                parent_collection_id: B256::ZERO,
                condition_id: CONDITION,
                partition: vec![U256::from(2u8)],
                amount: U256::from(6_000_000u64),
            }),
        };

        let neg_risk = registry();
        let output = Replay::new(params(0, None), &catalog, &legs, &neg_risk).run(vec![
            buy(100, tokens[0], 4_000_000, 10),
            buy(110, tokens[1], 6_000_000, 10),
            redemption,
            merge,
        ]);

        // the redemption consumed outcome 0 only
        let redemption_entry = output
            .entries
            .iter()
            .find(|entry| entry.kind == EntryKind::Redemption)
            .unwrap();
        assert_close(redemption_entry.quantity, 10.0);
        assert_close(redemption_entry.cost_basis, 4.0);
        assert_close(redemption_entry.realized_pnl, 6.0);

        // the merge consumed outcome 1 only
        let merge_entry = output
            .entries
            .iter()
            .find(|entry| entry.kind == EntryKind::Merge)
            .unwrap();
        assert_close(merge_entry.quantity, 10.0);
        assert_close(merge_entry.cost_basis, 6.0);
        assert_close(merge_entry.realized_pnl, 0.0);

        // nothing was double-consumed
        assert_eq!(output.inventory.total_quantity(tokens[0]), 0.0);
        assert_eq!(output.inventory.total_quantity(tokens[1]), 0.0);
        assert!(
            output
                .realized
                .iter()
                .all(|event| event.opened_at.is_some()),
            "no shortfall sub-events expected"
        );
    }

    #[test]
    fn conversion_shifts_basis_from_no_to_yes() {
        let market = B256::repeat_byte(0x77);
        let neg_risk = NegRiskRegistry::new(ADAPTER, WRAPPED, hashmap! { market => 2 });
        let (_, no_q0) = neg_risk.question_tokens(market, 0);
        let (yes_q1, _) = neg_risk.question_tokens(market, 1);

        let conversion = OrderedEvent {
            key: key(300, 0, EventTag::AdapterConversion),
            event: ChainEvent::AdapterConversion(AdapterConversion {
                tx_hash: B256::with_last_byte(3),
                market_id: market,
                index_set: U256::from(1u8),
                amount: tokens18(10),
            }),
        };
        let catalog = ConditionCatalog::default();
        let legs = TxLegs::default();
        let output = Replay::new(params(0, None), &catalog, &legs, &neg_risk).run(vec![
            buy(100, no_q0, 3_000_000, 10),
            conversion,
        ]);

        let entry = output
            .entries
            .iter()
            .find(|entry| entry.kind == EntryKind::AdapterConversion)
            .unwrap();
        assert_eq!(entry.realized_pnl, 0.0);
        assert_eq!(entry.cash_delta, 0.0);
        assert_close(entry.cost_basis, 3.0);
        assert_eq!(entry.quantity, 10.0);

        assert_eq!(output.inventory.total_quantity(no_q0), 0.0);
        assert_eq!(output.inventory.total_quantity(yes_q1), 10.0);
        assert_eq!(output.inventory.weighted_avg_unit_cost(yes_q1), Some(0.3));
        // a conversion never shows up in realized sub-events
        assert!(output.realized.is_empty());
    }

    #[test]
    fn snapshots_interleave_and_flush_at_end() {
        let catalog = ConditionCatalog::default();
        let legs = TxLegs::default();
        let neg_risk = registry();
        let output = Replay::new(params(3600, Some(7500)), &catalog, &legs, &neg_risk).run(vec![
            fee_refund(100, 1_000_000),
            fee_refund(4000, 1_000_000),
            fee_refund(7300, 1_000_000),
        ]);

        let at: Vec<i64> = output.snapshots.iter().map(|snapshot| snapshot.at).collect();
        assert_eq!(at, vec![3600, 7200, 7500]);
        // each snapshot sees exactly the fees credited before it
        assert_close(output.snapshots[0].realized_cum, 1.0);
        assert_close(output.snapshots[1].realized_cum, 2.0);
        assert_close(output.snapshots[2].realized_cum, 3.0);
        assert_close(output.snapshots[2].cashflow_cum, 3.0);
    }

    #[test]
    fn transfers_move_basis_without_realizing() {
        let catalog = ConditionCatalog::default();
        let other = Address::repeat_byte(0x01);
        let out_transfer = OrderedEvent {
            key: key(200, 0, EventTag::Transfer),
            event: ChainEvent::Transfer(Transfer {
                tx_hash: B256::with_last_byte(2),
                operator: WALLET,
                from: WALLET,
                to: other,
                token_id: TOKEN,
                value: tokens18(40),
            }),
        };
        let in_transfer = OrderedEvent {
            key: key(300, 0, EventTag::Transfer),
            event: ChainEvent::Transfer(Transfer {
                tx_hash: B256::with_last_byte(3),
                operator: other,
                from: other,
                to: WALLET,
                token_id: TOKEN,
                value: tokens18(10),
            }),
        };
        let output = run(
            vec![buy(100, TOKEN, 50_000_000, 100), out_transfer, in_transfer],
            &catalog,
        );

        let out_entry = &output.entries[1];
        assert_eq!(out_entry.kind, EntryKind::TransferOut);
        assert_eq!(out_entry.cost_basis, 20.0);
        assert_eq!(out_entry.unit_price, 0.5);
        assert_eq!(out_entry.realized_pnl, 0.0);
        assert_eq!(out_entry.cash_delta, 0.0);

        // incoming units inherit the bucket's average cost
        let in_entry = &output.entries[2];
        assert_eq!(in_entry.kind, EntryKind::TransferIn);
        assert_eq!(in_entry.unit_price, 0.5);
        assert_eq!(in_entry.cost_basis, 5.0);
        assert_eq!(output.inventory.total_quantity(TOKEN), 70.0);
        assert!(output.realized.is_empty());
    }

    #[test]
    fn transfer_in_without_history_uses_last_price_then_zero() {
        let catalog = ConditionCatalog::default();
        let other = Address::repeat_byte(0x01);
        let transfer = |ts: i64, token_id| OrderedEvent {
            key: key(ts, 0, EventTag::Transfer),
            event: ChainEvent::Transfer(Transfer {
                tx_hash: B256::with_last_byte(ts as u8),
                operator: other,
                from: other,
                to: WALLET,
                token_id,
                value: tokens18(10),
            }),
        };
        // sell the whole position so only the last price remains
        let output = run(
            vec![
                buy(100, TOKEN, 50_000_000, 100),
                sell(150, TOKEN, 70_000_000, 100, 0),
                transfer(200, TOKEN),
                transfer(250, U256::from(77u8)),
            ],
            &catalog,
        );
        assert_eq!(output.entries[2].unit_price, 0.7);
        // a token never seen before comes in at zero basis
        assert_eq!(output.entries[3].unit_price, 0.0);
    }

    #[test]
    fn mint_and_burn_transfers_get_their_own_kinds() {
        let catalog = ConditionCatalog::default();
        let mint = OrderedEvent {
            key: key(100, 0, EventTag::Transfer),
            event: ChainEvent::Transfer(Transfer {
                tx_hash: B256::with_last_byte(1),
                operator: Address::ZERO,
                from: Address::ZERO,
                to: WALLET,
                token_id: TOKEN,
                value: tokens18(5),
            }),
        };
        let burn = OrderedEvent {
            key: key(200, 0, EventTag::Transfer),
            event: ChainEvent::Transfer(Transfer {
                tx_hash: B256::with_last_byte(2),
                operator: WALLET,
                from: WALLET,
                to: Address::ZERO,
                token_id: TOKEN,
                value: tokens18(5),
            }),
        };
        let output = run(vec![mint, burn], &catalog);
        assert_eq!(output.entries[0].kind, EntryKind::Mint);
        assert_eq!(output.entries[1].kind, EntryKind::Burn);
        assert_eq!(output.inventory.total_quantity(TOKEN), 0.0);
    }

    #[test]
    fn fee_credits_are_pure_realized_pnl() {
        let catalog = ConditionCatalog::default();
        let output = run(vec![fee_refund(100, 250_000)], &catalog);
        let entry = &output.entries[0];
        assert_eq!(entry.kind, EntryKind::FeeRefund);
        assert_close(entry.cash_delta, 0.25);
        assert_close(entry.realized_pnl, 0.25);
        assert_eq!(output.realized.len(), 1);
        assert_eq!(output.realized[0].kind, RealizedKind::Fee);
    }

    #[test]
    fn zero_burn_merge_emits_the_zero_quantity_row() {
        // condition unknown to the catalog and no index sets to fall back
        // on: the merge has nothing identifiable to burn
        let catalog = ConditionCatalog::default();
        let merge = OrderedEvent {
            key: key(100, 0, EventTag::Merge),
            event: ChainEvent::Merge(Merge {
                tx_hash: B256::with_last_byte(1),
                collateral: COLLATERAL,
                parent_collection_id: B256::ZERO,
                condition_id: CONDITION,
                partition: Vec::new(),
                amount: U256::from(5_000_000u64),
            }),
        };
        let output = run(vec![merge], &catalog);
        let entry = &output.entries[0];
        assert_eq!(entry.quantity, 0.0);
        assert_eq!(entry.cash_delta, 5.0);
        assert_eq!(entry.realized_pnl, 5.0);
        // the matching sub-event keeps the realized sums closed
        assert_close(
            output.realized.iter().map(|event| event.realized_pnl).sum::<f64>(),
            5.0,
        );
    }

    #[test]
    fn selling_more_than_held_books_zero_basis_for_the_missing_part() {
        let catalog = ConditionCatalog::default();
        let output = run(
            vec![
                buy(100, TOKEN, 5_000_000, 10),
                sell(200, TOKEN, 14_000_000, 20, 0),
            ],
            &catalog,
        );
        let entry = &output.entries[1];
        // only the held 10 carry basis
        assert_close(entry.cost_basis, 5.0);
        assert_close(entry.realized_pnl, 9.0);
        assert_eq!(output.inventory.total_quantity(TOKEN), 0.0);
        // two sub-events: the real lot and the zero-basis shortfall
        assert_eq!(output.realized.len(), 2);
        assert_eq!(output.realized[1].opened_at, None);
        assert_close(output.realized[1].cost_basis, 0.0);
    }

    #[test]
    fn replay_is_deterministic_and_identities_hold() {
        let catalog = ConditionCatalog::new(vec![resolved_binary(CONDITION, 400)], None);
        let events = vec![
            buy(50, TOKEN, 30_000_000, 60),
            split(100, CONDITION, 10_000_000),
            sell(150, TOKEN, 14_000_000, 20, 500_000),
            fee_refund(250, 100_000),
            resolution(400, CONDITION),
            OrderedEvent {
                key: key(500, 0, EventTag::Redemption),
                event: ChainEvent::Redemption(Redemption {
                    tx_hash: B256::with_last_byte(55),
                    collateral: COLLATERAL,
                    parent_collection_id: B256::ZERO,
                    condition_id: CONDITION,
                    index_sets: vec![U256::from(1u8)],
                    payout: U256::from(10_000_000u64),
                }),
            },
        ];

        let run_once = || {
            let legs = TxLegs::default();
            let neg_risk = registry();
            Replay::new(params(120, Some(600)), &catalog, &legs, &neg_risk).run(events.clone())
        };
        let output = run_once();
        let again = run_once();
        assert_eq!(output.entries, again.entries);
        assert_eq!(output.snapshots, again.snapshots);
        assert_eq!(output.realized, again.realized);

        // realized sums agree between entries and sub-events
        let entry_pnl: f64 = output.entries.iter().map(|entry| entry.realized_pnl).sum();
        let realized_pnl: f64 = output.realized.iter().map(|event| event.realized_pnl).sum();
        assert_close(entry_pnl, realized_pnl);

        // cashflow of the final snapshot is the prefix sum of cash deltas
        let cash: f64 = output.entries.iter().map(|entry| entry.cash_delta).sum();
        let last = output.snapshots.last().unwrap();
        assert_eq!(last.at, 600);
        assert_close(last.cashflow_cum, cash);
        assert_close(last.realized_cum, entry_pnl);

        // every snapshot is the prefix sum of entries up to its boundary
        for snapshot in &output.snapshots {
            let realized: f64 = output
                .entries
                .iter()
                .filter(|entry| entry.timestamp <= snapshot.at)
                .map(|entry| entry.realized_pnl)
                .sum();
            let cash: f64 = output
                .entries
                .iter()
                .filter(|entry| entry.timestamp <= snapshot.at)
                .map(|entry| entry.cash_delta)
                .sum();
            assert_close(snapshot.realized_cum, realized);
            assert_close(snapshot.cashflow_cum, cash);
            assert_close(snapshot.unrealized, snapshot.open_value - snapshot.open_cost);
        }
        for (_, lot) in output.inventory.open_lots() {
            assert!(lot.quantity > 0.0);
        }

        // resolution closure: the losing outcome is gone
        let losing = catalog.outcome_tokens(&CONDITION).unwrap()[1];
        assert_eq!(output.inventory.total_quantity(losing), 0.0);
    }
}
