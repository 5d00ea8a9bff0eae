use {
    crate::{Address, ConditionId, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

/// `PositionSplit` row: collateral locked in exchange for a basket of
/// outcome tokens.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Split {
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
) -> BoxStream<'a, Result<Split, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, stakeholder,
       collateral, parent_collection_id, condition_id, partition, amount
FROM splits
WHERE stakeholder = $1
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert(ex: &mut PgConnection, row: &Split) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO splits (
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

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::byte_array::ByteArray,
        futures::TryStreamExt,
        sqlx::Connection,
    };

    #[tokio::test]
    #[ignore]
    async fn postgres_round_trip() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let wallet: Address = ByteArray([1; 20]);
        let row = Split {
            block_timestamp: 1_700_000_000,
            block_number: 7,
            log_index: 0,
            stakeholder: wallet,
            partition: vec![BigDecimal::from(1), BigDecimal::from(2)],
            amount: BigDecimal::from(10_000_000u64),
            ..Default::default()
        };
        insert(&mut db, &row).await.unwrap();

        let read: Vec<Split> = for_wallet(&mut db, &wallet, None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(read, vec![row]);
    }
}
