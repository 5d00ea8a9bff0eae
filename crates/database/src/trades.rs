use {
    crate::{Address, TransactionHash},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

/// One `OrderFilled` row. `token_id`, `usdc_amount` and `token_amount` are
/// the normalized outcome-token leg; the maker/taker asset columns keep the
/// raw fill for reconciliation queries.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Trade {
    pub block_timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: TransactionHash,
    pub maker: Address,
    pub taker: Address,
    pub maker_asset_id: BigDecimal,
    pub taker_asset_id: BigDecimal,
    pub maker_amount: BigDecimal,
    pub taker_amount: BigDecimal,
    pub token_id: BigDecimal,
    pub usdc_amount: BigDecimal,
    pub token_amount: BigDecimal,
    pub fee: BigDecimal,
    pub is_maker_buy: bool,
    pub is_taker_buy: bool,
}

/// All trades the wallet participates in, as maker or taker, in replay
/// order.
pub fn for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
    end_ts: Option<i64>,
) -> BoxStream<'a, Result<Trade, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT block_timestamp, block_number, log_index, tx_hash, maker, taker,
       maker_asset_id, taker_asset_id, maker_amount, taker_amount,
       token_id, usdc_amount, token_amount, fee, is_maker_buy, is_taker_buy
FROM trades
WHERE (maker = $1 OR taker = $1)
  AND ($2::bigint IS NULL OR block_timestamp <= $2)
ORDER BY block_timestamp, block_number, log_index
"#;
    sqlx::query_as(QUERY).bind(wallet).bind(end_ts).fetch(ex)
}

pub async fn insert(ex: &mut PgConnection, row: &Trade) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO trades (
    block_timestamp, block_number, log_index, tx_hash, maker, taker,
    maker_asset_id, taker_asset_id, maker_amount, taker_amount,
    token_id, usdc_amount, token_amount, fee, is_maker_buy, is_taker_buy
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
ON CONFLICT DO NOTHING
"#;
    sqlx::query(QUERY)
        .bind(row.block_timestamp)
        .bind(row.block_number)
        .bind(row.log_index)
        .bind(row.tx_hash)
        .bind(row.maker)
        .bind(row.taker)
        .bind(&row.maker_asset_id)
        .bind(&row.taker_asset_id)
        .bind(&row.maker_amount)
        .bind(&row.taker_amount)
        .bind(&row.token_id)
        .bind(&row.usdc_amount)
        .bind(&row.token_amount)
        .bind(&row.fee)
        .bind(row.is_maker_buy)
        .bind(row.is_taker_buy)
        .execute(ex)
        .await?;
    Ok(())
}
