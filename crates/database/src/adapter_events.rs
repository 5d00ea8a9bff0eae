//! Rows emitted by the negative-risk adapter. Splits and merges reference a
//! single binary condition against the wrapped collateral; redemptions carry
//! explicit per-outcome amounts; conversions swap NO positions on some
//! questions of a multi-question market for YES positions on the others.

use {
    crate::{Address, ConditionId, MarketId, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct AdapterSplit {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub stakeholder: Address,
    pub condition_id: ConditionId,
    pub amount: BigDecimal,
}

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct AdapterMerge {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub stakeholder: Address,
    pub condition_id: ConditionId,
    pub amount: BigDecimal,
}

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct AdapterRedemption {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub redeemer: Address,
    pub condition_id: ConditionId,
    pub amounts: Vec<BigDecimal>,
    pub payout: BigDecimal,
}

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct AdapterConversion {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub stakeholder: Address,
    pub market_id: MarketId,
    pub index_set: BigDecimal,
    pub amount: BigDecimal,
}

pub fn splits_for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<AdapterSplit, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, stakeholder, condition_id, amount
FROM adapter_splits
WHERE stakeholder = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub fn merges_for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<AdapterMerge, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, stakeholder, condition_id, amount
FROM adapter_merges
WHERE stakeholder = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub fn redemptions_for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<AdapterRedemption, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, redeemer, condition_id, amounts, payout
FROM adapter_redemptions
WHERE redeemer = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub fn conversions_for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<AdapterConversion, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, stakeholder, market_id, index_set, amount
FROM adapter_conversions
WHERE stakeholder = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert_split(ex: &mut PgConnection, row: &AdapterSplit) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO adapter_splits (
    block_timestamp, block_number, log_index, tx_hash, stakeholder, condition_id, amount
) VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.stakeholder)
        .bind(row.condition_id)
        .bind(&row.amount)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn insert_merge(ex: &mut PgConnection, row: &AdapterMerge) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO adapter_merges (
    block_timestamp, block_number, log_index, tx_hash, stakeholder, condition_id, amount
) VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.stakeholder)
        .bind(row.condition_id)
        .bind(&row.amount)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn insert_redemption(
    ex: &mut PgConnection,
    row: &AdapterRedemption,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO adapter_redemptions (
    block_timestamp, block_number, log_index, tx_hash, redeemer, condition_id, amounts, payout
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.redeemer)
        .bind(row.condition_id)
        .bind(&row.amounts)
        .bind(&row.payout)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn insert_conversion(
    ex: &mut PgConnection,
    row: &AdapterConversion,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO adapter_conversions (
    block_timestamp, block_number, log_index, tx_hash, stakeholder, market_id, index_set, amount
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.stakeholder)
        .bind(row.market_id)
        .bind(&row.index_set)
        .bind(&row.amount)
        .execute(ex)
        .await?;
    Ok(())
}
