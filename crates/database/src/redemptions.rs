use {
    crate::{Address, ConditionId, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

/// `PayoutRedemption` row: held outcome tokens of a resolved condition
/// exchanged for the collateral payout.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Redemption {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub redeemer: Address,
    pub collateral: Address,
    pub parent_collection_id: ConditionId,
    pub condition_id: ConditionId,
    pub index_sets: Vec<BigDecimal>,
    pub payout: BigDecimal,
}

pub fn for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<Redemption, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, redeemer,
       collateral, parent_collection_id, condition_id, index_sets, payout
FROM redemptions
WHERE redeemer = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert(ex: &mut PgConnection, row: &Redemption) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO redemptions (
    block_timestamp, block_number, log_index, tx_hash, redeemer,
    collateral, parent_collection_id, condition_id, index_sets, payout
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.redeemer)
        .bind(row.collateral)
        .bind(row.parent_collection_id)
        .bind(row.condition_id)
        .bind(&row.index_sets)
        .bind(&row.payout)
        .execute(ex)
        .await?;
    Ok(())
}
