//! Fee module payouts to wallets: refunds of overcharged order fees and
//! operator-initiated withdrawals. Both credit the wallet in collateral.

use {
    crate::{Address, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct FeeRefund {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub module: Address,
    pub order_hash: Option<TransactionHash>,
    pub recipient: Address,
    pub token_id: BigDecimal,
    pub refund: BigDecimal,
    pub fee_charged: BigDecimal,
}

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct FeeWithdrawal {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub recipient: Address,
    pub token_id: BigDecimal,
    pub amount: BigDecimal,
}

pub fn refunds_for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<FeeRefund, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, module,
       order_hash, recipient, token_id, refund, fee_charged
FROM fee_refunds
WHERE recipient = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub fn withdrawals_for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<FeeWithdrawal, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, recipient, token_id, amount
FROM fee_withdrawals
WHERE recipient = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert_refund(ex: &mut PgConnection, row: &FeeRefund) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO fee_refunds (
    block_timestamp, block_number, log_index, tx_hash, module,
    order_hash, recipient, token_id, refund, fee_charged
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.module)
        .bind(row.order_hash)
        .bind(row.recipient)
        .bind(&row.token_id)
        .bind(&row.refund)
        .bind(&row.fee_charged)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn insert_withdrawal(
    ex: &mut PgConnection,
    row: &FeeWithdrawal,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO fee_withdrawals (
    block_timestamp, block_number, log_index, tx_hash, recipient, token_id, amount
) VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.recipient)
        .bind(&row.token_id)
        .bind(&row.amount)
        .execute(ex)
        .await?;
    Ok(())
}
