use {
    crate::Address,
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

/// Pre-aggregated wallet ranking maintained by the leaderboard job. Read
/// here only to seed the top-N batch driver.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Ranking {
    pub wallet: Address,
    pub volume: BigDecimal,
    pub rank: i64,
}

pub fn top_wallets(ex: &mut PgConnection, count: i64) -> BoxStream<'_, Result<Ranking, sqlx::Error>> {
    const QUERY: &str = "SELECT wallet, volume, rank FROM wallet_rankings ORDER BY rank LIMIT $1";
    sqlx::query_as(QUERY).bind(count).fetch(ex)
}

pub async fn upsert(ex: &mut PgConnection, row: &Ranking) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO wallet_rankings (wallet, volume, rank)
VALUES ($1, $2, $3)
ON CONFLICT (wallet) DO UPDATE SET volume = EXCLUDED.volume, rank = EXCLUDED.rank
"#;
    sqlx::query(QUERY)
        .bind(row.wallet)
        .bind(&row.volume)
        .bind(row.rank)
        .execute(ex)
        .await?;
    Ok(())
}
