//! The write phase: one transaction per wallet, scoped delete of the
//! requested range on both output tables, then the fresh rows. Reruns over
//! the same range converge to the same state.

use {
    crate::loader::to_db_address,
    anyhow::{Context, Result},
    database::{
        byte_array::ByteArray,
        ledger::LedgerRow,
        snapshots::SnapshotRow,
    },
    ledger::{
        engine::ReplayOutput,
        entry::{LedgerEntry, Snapshot},
    },
    number::conversions::u256_to_big_decimal,
    sqlx::PgPool,
};

pub async fn write_replay(
    pool: &PgPool,
    wallet: alloy_primitives::Address,
    start_ts: i64,
    end_ts: i64,
    output: &ReplayOutput,
) -> Result<(usize, usize)> {
    let ledger_rows: Vec<LedgerRow> = output
        .entries
        .iter()
        .filter(|entry| (start_ts..=end_ts).contains(&entry.timestamp))
        .map(ledger_row)
        .collect();
    let snapshot_rows: Vec<SnapshotRow> = output
        .snapshots
        .iter()
        .filter(|snapshot| (start_ts..=end_ts).contains(&snapshot.at))
        .map(snapshot_row)
        .collect();
    let wallet = to_db_address(wallet);

    // the delete runs even when there is nothing new to write, so a rerun
    // over a now-empty range clears stale rows
    let mut transaction = pool.begin().await.context("begin")?;
    database::ledger::delete_range(&mut transaction, &wallet, start_ts, end_ts)
        .await
        .context("delete ledger range")?;
    database::snapshots::delete_range(&mut transaction, &wallet, start_ts, end_ts)
        .await
        .context("delete snapshot range")?;
    database::ledger::append(&mut transaction, &ledger_rows)
        .await
        .context("append ledger rows")?;
    database::snapshots::append(&mut transaction, &snapshot_rows)
        .await
        .context("append snapshot rows")?;
    transaction.commit().await.context("commit")?;
    Ok((ledger_rows.len(), snapshot_rows.len()))
}

fn ledger_row(entry: &LedgerEntry) -> LedgerRow {
    LedgerRow {
        id: entry.id.clone(),
        wallet: to_db_address(entry.wallet),
        event_type: entry.kind.to_string(),
        tx_hash: ByteArray(entry.tx_hash.0),
        log_index: entry.log_index,
        block_number: entry.block_number,
        block_timestamp: entry.timestamp,
        token_id: entry.token_id.map(|token| u256_to_big_decimal(&token)),
        condition_id: entry.condition_id.map(|condition| ByteArray(condition.0)),
        quantity: entry.quantity,
        cash_delta: entry.cash_delta,
        unit_price: entry.unit_price,
        cost_basis: entry.cost_basis,
        realized_pnl: entry.realized_pnl,
        entry_timestamp: entry.entry_timestamp,
        metadata: entry.metadata.clone(),
    }
}

fn snapshot_row(snapshot: &Snapshot) -> SnapshotRow {
    SnapshotRow {
        wallet: to_db_address(snapshot.wallet),
        at: snapshot.at,
        realized_cum: snapshot.realized_cum,
        unrealized: snapshot.unrealized,
        open_cost: snapshot.open_cost,
        open_value: snapshot.open_value,
        cashflow_cum: snapshot.cashflow_cum,
        open_token_count: snapshot.open_token_count,
    }
}
