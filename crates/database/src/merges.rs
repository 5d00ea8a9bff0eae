use {
    crate::{Address, ConditionId, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

/// `PositionsMerge` row: a basket of outcome tokens burned back into
/// collateral. Same shape as a split, opposite direction.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Merge {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub stakeholder: Address,
    pub collateral: Address,
    pub parent_collection_id: ConditionId,
    pub condition_id: ConditionId,
    pub partition: Vec<BigDecimal>,
    pub amount: BigDecimal,
}

pub fn for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<Merge, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, stakeholder,
       collateral, parent_collection_id, condition_id, partition, amount
FROM merges
WHERE stakeholder = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert(ex: &mut PgConnection, row: &Merge) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO merges (
    block_timestamp, block_number, log_index, tx_hash, stakeholder,
    collateral, parent_collection_id, condition_id, partition, amount
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.stakeholder)
        .bind(row.collateral)
        .bind(row.parent_collection_id)
        .bind(row.condition_id)
        .bind(&row.partition)
        .bind(&row.amount)
        .execute(ex)
        .await?;
    Ok(())
}
