//! Bulk-fetches every event family a wallet participates in and converts
//! the rows into the engine's typed events. All I/O happens here, before
//! the replay starts; the engine itself never suspends.

use {
    crate::arguments::ProtocolConfig,
    alloy_primitives::{Address, B256, U256},
    anyhow::{Context, Result},
    bigdecimal::BigDecimal,
    database::byte_array::ByteArray,
    futures::TryStreamExt,
    ledger::{
        conditions::{Condition, ConditionCatalog},
        engine::TxLegs,
        events::{
            AdapterConversion, AdapterMerge, AdapterRedemption, AdapterSplit, ChainEvent,
            EventKey, EventTag, FeePayout, Merge, OrderedEvent, Redemption, Split, Trade,
            TradeRole, Transfer,
        },
        stream::StreamInputs,
        tokens::NegRiskRegistry,
    },
    sqlx::PgPool,
    std::collections::HashMap,
};

/// Everything a single wallet replay needs, fetched in one pass.
pub struct WalletData {
    pub inputs: StreamInputs,
    pub legs: TxLegs,
    pub catalog: ConditionCatalog,
    pub neg_risk: NegRiskRegistry,
}

pub async fn load_wallet(
    pool: &PgPool,
    wallet: Address,
    end_ts: Option<i64>,
    protocol: &ProtocolConfig,
) -> Result<WalletData> {
    let mut ex = pool.acquire().await.context("acquire connection")?;
    let db_wallet = to_db_address(wallet);

    let mut inputs = StreamInputs::default();

    let trades: Vec<database::trades::Trade> =
        database::trades::for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load trades")?;
    for row in &trades {
        inputs
            .trades
            .extend(trade_events(row, &db_wallet).context("convert trade")?);
    }

    let splits: Vec<database::splits::Split> =
        database::splits::for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load splits")?;
    inputs.splits = splits
        .iter()
        .map(split_event)
        .collect::<Result<_>>()
        .context("convert split")?;

    let merges: Vec<database::merges::Merge> =
        database::merges::for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load merges")?;
    inputs.merges = merges
        .iter()
        .map(merge_event)
        .collect::<Result<_>>()
        .context("convert merge")?;

    let redemptions: Vec<database::redemptions::Redemption> =
        database::redemptions::for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load redemptions")?;
    inputs.redemptions = redemptions
        .iter()
        .map(redemption_event)
        .collect::<Result<_>>()
        .context("convert redemption")?;

    let adapter_splits: Vec<database::adapter_events::AdapterSplit> =
        database::adapter_events::splits_for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load adapter splits")?;
    inputs.adapter_splits = adapter_splits
        .iter()
        .map(adapter_split_event)
        .collect::<Result<_>>()
        .context("convert adapter split")?;

    let adapter_merges: Vec<database::adapter_events::AdapterMerge> =
        database::adapter_events::merges_for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load adapter merges")?;
    inputs.adapter_merges = adapter_merges
        .iter()
        .map(adapter_merge_event)
        .collect::<Result<_>>()
        .context("convert adapter merge")?;

    let adapter_redemptions: Vec<database::adapter_events::AdapterRedemption> =
        database::adapter_events::redemptions_for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load adapter redemptions")?;
    inputs.adapter_redemptions = adapter_redemptions
        .iter()
        .map(adapter_redemption_event)
        .collect::<Result<_>>()
        .context("convert adapter redemption")?;

    let adapter_conversions: Vec<database::adapter_events::AdapterConversion> =
        database::adapter_events::conversions_for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load adapter conversions")?;
    inputs.adapter_conversions = adapter_conversions
        .iter()
        .map(conversion_event)
        .collect::<Result<_>>()
        .context("convert adapter conversion")?;

    let transfer_rows: Vec<database::transfers::Transfer> =
        database::transfers::for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load transfers")?;
    let transfers: Vec<(EventKey, Transfer)> = transfer_rows
        .iter()
        .map(transfer_event)
        .collect::<Result<_>>()
        .context("convert transfer")?;
    let legs = TxLegs::from_transfers(wallet, transfers.iter().map(|(_, transfer)| transfer));
    inputs.transfers = transfers
        .into_iter()
        .map(|(key, transfer)| OrderedEvent {
            key,
            event: ChainEvent::Transfer(transfer),
        })
        .collect();

    let refunds: Vec<database::fees::FeeRefund> =
        database::fees::refunds_for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load fee refunds")?;
    inputs.fee_refunds = refunds
        .iter()
        .map(fee_refund_event)
        .collect::<Result<_>>()
        .context("convert fee refund")?;

    let withdrawals: Vec<database::fees::FeeWithdrawal> =
        database::fees::withdrawals_for_wallet(&mut ex, &db_wallet, end_ts)
            .try_collect()
            .await
            .context("load fee withdrawals")?;
    inputs.fee_withdrawals = withdrawals
        .iter()
        .map(fee_withdrawal_event)
        .collect::<Result<_>>()
        .context("convert fee withdrawal")?;

    let condition_rows: Vec<database::conditions::Condition> = database::conditions::all(&mut ex)
        .try_collect()
        .await
        .context("load conditions")?;
    let conditions = condition_rows
        .iter()
        .map(condition)
        .collect::<Result<Vec<_>>>()
        .context("convert condition")?;
    let catalog = ConditionCatalog::new(conditions, end_ts);

    let market_rows: Vec<database::neg_risk_markets::NegRiskMarket> =
        database::neg_risk_markets::all(&mut ex)
            .try_collect()
            .await
            .context("load neg risk markets")?;
    let question_counts: HashMap<B256, u32> = market_rows
        .iter()
        .map(|row| (B256::from(row.market_id.0), row.question_count.max(0) as u32))
        .collect();
    let neg_risk = NegRiskRegistry::new(
        protocol.neg_risk_adapter,
        protocol.wrapped_collateral,
        question_counts,
    );

    Ok(WalletData {
        inputs,
        legs,
        catalog,
        neg_risk,
    })
}

pub fn to_db_address(address: Address) -> database::Address {
    ByteArray(address.0.0)
}

fn to_u256(value: &BigDecimal, column: &str) -> Result<U256> {
    number::conversions::big_decimal_to_u256(value)
        .with_context(|| format!("malformed numeric in {column}: {value}"))
}

fn key(timestamp: i64, block_number: i64, log_index: i64, tag: EventTag) -> EventKey {
    EventKey {
        timestamp,
        block_number,
        log_index,
        tag,
    }
}

/// A fill where the wallet sits on both sides yields one event per role.
fn trade_events(
    row: &database::trades::Trade,
    wallet: &database::Address,
) -> Result<Vec<OrderedEvent>> {
    let token_id = to_u256(&row.token_id, "trades.token_id")?;
    let usdc_amount = to_u256(&row.usdc_amount, "trades.usdc_amount")?;
    let token_amount = to_u256(&row.token_amount, "trades.token_amount")?;
    let fee = to_u256(&row.fee, "trades.fee")?;
    let leg = |is_buy: bool, role: TradeRole| OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::Trade,
        ),
        event: ChainEvent::Trade(Trade {
            tx_hash: B256::from(row.tx_hash.0),
            token_id,
            usdc_amount,
            token_amount,
            fee,
            is_buy,
            role,
        }),
    };
    let mut events = Vec::new();
    if row.maker == *wallet {
        events.push(leg(row.is_maker_buy, TradeRole::Maker));
    }
    if row.taker == *wallet {
        events.push(leg(row.is_taker_buy, TradeRole::Taker));
    }
    Ok(events)
}

fn split_event(row: &database::splits::Split) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::Split,
        ),
        event: ChainEvent::Split(Split {
            tx_hash: B256::from(row.tx_hash.0),
            collateral: Address::from(row.collateral.0),
            parent_collection_id: B256::from(row.parent_collection_id.0),
            condition_id: B256::from(row.condition_id.0),
            partition: index_sets(&row.partition, "splits.partition")?,
            amount: to_u256(&row.amount, "splits.amount")?,
        }),
    })
}

fn merge_event(row: &database::merges::Merge) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::Merge,
        ),
        event: ChainEvent::Merge(Merge {
            tx_hash: B256::from(row.tx_hash.0),
            collateral: Address::from(row.collateral.0),
            parent_collection_id: B256::from(row.parent_collection_id.0),
            condition_id: B256::from(row.condition_id.0),
            partition: index_sets(&row.partition, "merges.partition")?,
            amount: to_u256(&row.amount, "merges.amount")?,
        }),
    })
}

fn redemption_event(row: &database::redemptions::Redemption) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::Redemption,
        ),
        event: ChainEvent::Redemption(Redemption {
            tx_hash: B256::from(row.tx_hash.0),
            collateral: Address::from(row.collateral.0),
            parent_collection_id: B256::from(row.parent_collection_id.0),
            condition_id: B256::from(row.condition_id.0),
            index_sets: index_sets(&row.index_sets, "redemptions.index_sets")?,
            payout: to_u256(&row.payout, "redemptions.payout")?,
        }),
    })
}

fn adapter_split_event(row: &database::adapter_events::AdapterSplit) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::AdapterSplit,
        ),
        event: ChainEvent::AdapterSplit(AdapterSplit {
            tx_hash: B256::from(row.tx_hash.0),
            condition_id: B256::from(row.condition_id.0),
            amount: to_u256(&row.amount, "adapter_splits.amount")?,
        }),
    })
}

fn adapter_merge_event(row: &database::adapter_events::AdapterMerge) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::AdapterMerge,
        ),
        event: ChainEvent::AdapterMerge(AdapterMerge {
            tx_hash: B256::from(row.tx_hash.0),
            condition_id: B256::from(row.condition_id.0),
            amount: to_u256(&row.amount, "adapter_merges.amount")?,
        }),
    })
}

fn adapter_redemption_event(
    row: &database::adapter_events::AdapterRedemption,
) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::AdapterRedemption,
        ),
        event: ChainEvent::AdapterRedemption(AdapterRedemption {
            tx_hash: B256::from(row.tx_hash.0),
            condition_id: B256::from(row.condition_id.0),
            amounts: index_sets(&row.amounts, "adapter_redemptions.amounts")?,
            payout: to_u256(&row.payout, "adapter_redemptions.payout")?,
        }),
    })
}

fn conversion_event(row: &database::adapter_events::AdapterConversion) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::AdapterConversion,
        ),
        event: ChainEvent::AdapterConversion(AdapterConversion {
            tx_hash: B256::from(row.tx_hash.0),
            market_id: B256::from(row.market_id.0),
            index_set: to_u256(&row.index_set, "adapter_conversions.index_set")?,
            amount: to_u256(&row.amount, "adapter_conversions.amount")?,
        }),
    })
}

fn transfer_event(row: &database::transfers::Transfer) -> Result<(EventKey, Transfer)> {
    Ok((
        key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::Transfer,
        ),
        Transfer {
            tx_hash: B256::from(row.tx_hash.0),
            operator: Address::from(row.operator.0),
            from: Address::from(row.sender.0),
            to: Address::from(row.recipient.0),
            token_id: to_u256(&row.token_id, "transfers.token_id")?,
            value: to_u256(&row.value, "transfers.value")?,
        },
    ))
}

fn fee_refund_event(row: &database::fees::FeeRefund) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::FeeRefund,
        ),
        event: ChainEvent::FeeRefund(FeePayout {
            tx_hash: B256::from(row.tx_hash.0),
            token_id: Some(to_u256(&row.token_id, "fee_refunds.token_id")?),
            amount: to_u256(&row.refund, "fee_refunds.refund")?,
        }),
    })
}

fn fee_withdrawal_event(row: &database::fees::FeeWithdrawal) -> Result<OrderedEvent> {
    Ok(OrderedEvent {
        key: key(
            row.block_timestamp,
            row.block_number,
            row.log_index,
            EventTag::FeeWithdrawal,
        ),
        event: ChainEvent::FeeWithdrawal(FeePayout {
            tx_hash: B256::from(row.tx_hash.0),
            token_id: Some(to_u256(&row.token_id, "fee_withdrawals.token_id")?),
            amount: to_u256(&row.amount, "fee_withdrawals.amount")?,
        }),
    })
}

fn condition(row: &database::conditions::Condition) -> Result<Condition> {
    Ok(Condition {
        id: B256::from(row.condition_id.0),
        oracle: Address::from(row.oracle.0),
        outcome_slot_count: row.outcome_slot_count.max(0) as u32,
        parent_collection_id: B256::from(row.parent_collection_id.0),
        collateral_token: Address::from(row.collateral_token.0),
        payout_numerators: index_sets(&row.payout_numerators, "conditions.payout_numerators")?,
        payout_denominator: to_u256(&row.payout_denominator, "conditions.payout_denominator")?,
        resolved_at: if row.is_resolved { row.resolved_at } else { 0 },
        resolved_block: if row.is_resolved {
            row.resolved_block
        } else {
            0
        },
    })
}

fn index_sets(values: &[BigDecimal], column: &str) -> Result<Vec<U256>> {
    values.iter().map(|value| to_u256(value, column)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_rows_expand_to_one_event_per_role() {
        let wallet: database::Address = ByteArray([0xaa; 20]);
        let other: database::Address = ByteArray([0xbb; 20]);
        let row = database::trades::Trade {
            block_timestamp: 100,
            block_number: 1,
            log_index: 2,
            maker: wallet,
            taker: other,
            token_id: BigDecimal::from(7u64),
            usdc_amount: BigDecimal::from(50_000_000u64),
            token_amount: BigDecimal::from(100u64),
            is_maker_buy: true,
            is_taker_buy: false,
            ..Default::default()
        };

        let events = trade_events(&row, &wallet).unwrap();
        assert_eq!(events.len(), 1);
        let ChainEvent::Trade(trade) = &events[0].event else {
            panic!("expected trade");
        };
        assert!(trade.is_buy);
        assert_eq!(trade.role, TradeRole::Maker);

        // wallet on both sides: both legs materialize
        let mut both = row.clone();
        both.taker = wallet;
        let events = trade_events(&both, &wallet).unwrap();
        assert_eq!(events.len(), 2);
        let ChainEvent::Trade(taker_leg) = &events[1].event else {
            panic!("expected trade");
        };
        assert!(!taker_leg.is_buy);
        assert_eq!(taker_leg.role, TradeRole::Taker);
    }

    #[test]
    fn malformed_numerics_are_fatal() {
        let wallet: database::Address = ByteArray([0xaa; 20]);
        let row = database::trades::Trade {
            maker: wallet,
            token_id: BigDecimal::from(-5),
            ..Default::default()
        };
        assert!(trade_events(&row, &wallet).is_err());
    }

    #[test]
    fn unresolved_condition_rows_carry_no_resolution() {
        let row = database::conditions::Condition {
            condition_id: ByteArray([1; 32]),
            outcome_slot_count: 2,
            payout_denominator: BigDecimal::from(1),
            resolved_at: 12345,
            resolved_block: 10,
            is_resolved: false,
            ..Default::default()
        };
        let converted = condition(&row).unwrap();
        assert_eq!(converted.resolved_at, 0);
        assert!(!converted.is_resolved());
    }
}
