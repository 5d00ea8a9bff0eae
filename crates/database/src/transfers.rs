use {
    crate::{Address, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

/// One ERC-1155 single-transfer leg. Batch transfers are flattened into one
/// row per token id by the extraction layer.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Transfer {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub operator: Address,
    pub sender: Address,
    pub recipient: Address,
    pub token_id: BigDecimal,
    pub value: BigDecimal,
}

/// All transfers touching the wallet on either side, in replay order.
pub fn for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<Transfer, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, operator,
       sender, recipient, token_id, value
FROM transfers
WHERE (sender = $1 OR recipient = $1)
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert(ex: &mut PgConnection, row: &Transfer) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO transfers (
    block_timestamp, block_number, log_index, tx_hash, operator,
    sender, recipient, token_id, value
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.operator)
        .bind(row.sender)
        .bind(row.recipient)
        .bind(&row.token_id)
        .bind(&row.value)
        .execute(ex)
        .await?;
    Ok(())
}
