//! The ledger output table. Rows are only ever written by the replayer,
//! which deletes the wallet's time range first so a rerun converges to the
//! same state.

use {
    crate::{Address, ConditionId, PgTransaction, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct LedgerRow {
    pub id: String,
    pub wallet: Address,
    pub event_type: String,
    pub tx_hash: TransactionHash,
    pub log_index: i64,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub token_id: Option<BigDecimal>,
    pub condition_id: Option<ConditionId>,
    pub quantity: f64,
    pub cash_delta: f64,
    pub unit_price: f64,
    pub cost_basis: f64,
    pub realized_pnl: f64,
    pub entry_timestamp: i64,
    pub metadata: serde_json::Value,
}

impl Default for LedgerRow {
    fn default() -> Self {
        Self {
            id: String::new(),
            wallet: Default::default(),
            event_type: String::new(),
            tx_hash: Default::default(),
            log_index: 0,
            block_number: 0,
            block_timestamp: 0,
            token_id: None,
            condition_id: None,
            quantity: 0.,
            cash_delta: 0.,
            unit_price: 0.,
            cost_basis: 0.,
            realized_pnl: 0.,
            entry_timestamp: 0,
            metadata: serde_json::Value::Null,
        }
    }
}

pub async fn delete_range(
    ex: &mut PgConnection,
    wallet: &Address,
    start_ts: i64,
    end_ts: i64,
) -> Result<(), sqlx::Error> {
    const QUERY: &str =
        "DELETE FROM wallet_ledger WHERE wallet = $1 AND block_timestamp BETWEEN $2 AND $3";
    sqlx::query(QUERY)
        .bind(wallet)
        .bind(start_ts)
        .bind(end_ts)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn append(ex: &mut PgTransaction<'_>, rows: &[LedgerRow]) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO wallet_ledger (
    id, wallet, event_type, tx_hash, log_index, block_number, block_timestamp,
    token_id, condition_id, quantity, cash_delta, unit_price, cost_basis,
    realized_pnl, entry_timestamp, metadata
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
ON CONFLICT DO NOTHING
"#;
    for row in rows {
        sqlx::query(QUERY)
            .bind(&row.id)
            .bind(row.wallet)
            .bind(&row.event_type)
            .bind(row.tx_hash)
            .bind(row.log_index)
            .bind(row.block_number)
            .bind(row.block_timestamp)
            .bind(&row.token_id)
            .bind(row.condition_id)
            .bind(row.quantity)
            .bind(row.cash_delta)
            .bind(row.unit_price)
            .bind(row.cost_basis)
            .bind(row.realized_pnl)
            .bind(row.entry_timestamp)
            .bind(&row.metadata)
            .execute(&mut **ex)
            .await?;
    }
    Ok(())
}

pub fn for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
) -> BoxStream<'a, Result<LedgerRow, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT id, wallet, event_type, tx_hash, log_index, block_number, block_timestamp,
       token_id, condition_id, quantity, cash_delta, unit_price, cost_basis,
       realized_pnl, entry_timestamp, metadata
FROM wallet_ledger
WHERE wallet = $1
ORDER BY wallet, block_timestamp, id
"#;
    sqlx::query_as(QUERY).bind(wallet).fetch(ex)
}
