use {crate::MarketId, futures::stream::BoxStream, sqlx::PgConnection};

/// Question count per negative-risk market. Sole authority for the
/// conversion fallback when a conversion transaction carries no transfer
/// legs.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct NegRiskMarket {
    pub market_id: MarketId,
    pub question_count: i32,
}

pub fn all(ex: &mut PgConnection) -> BoxStream<'_, Result<NegRiskMarket, sqlx::Error>> {
    const QUERY: &str = "SELECT market_id, question_count FROM neg_risk_markets ORDER BY market_id";
    sqlx::query_as(QUERY).fetch(ex)
}

pub async fn upsert(ex: &mut PgConnection, row: &NegRiskMarket) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO neg_risk_markets (market_id, question_count)
VALUES ($1, $2)
ON CONFLICT (market_id) DO UPDATE SET question_count = EXCLUDED.question_count
"#;
    sqlx::query(QUERY)
        .bind(row.market_id)
        .bind(row.question_count)
        .execute(ex)
        .await?;
    Ok(())
}
