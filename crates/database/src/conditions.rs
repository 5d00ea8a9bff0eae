use {
    crate::{Address, ConditionId},
    bigdecimal::BigDecimal,
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Condition {
    pub condition_id: ConditionId,
    pub oracle: Address,
    pub outcome_slot_count: i32,
    pub parent_collection_id: ConditionId,
    pub collateral_token: Address,
    pub payout_numerators: Vec<BigDecimal>,
    pub payout_denominator: BigDecimal,
    pub resolved_at: i64,
    pub resolved_block: i64,
    pub is_resolved: bool,
}

/// The full condition list. Small relative to the event tables, so the
/// catalog loads it whole.
pub fn all(ex: &mut PgConnection) -> BoxStream<'_, Result<Condition, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT condition_id, oracle, outcome_slot_count, parent_collection_id,
       collateral_token, payout_numerators, payout_denominator,
       resolved_at, resolved_block, is_resolved
FROM conditions
ORDER BY condition_id
"#;
    sqlx::query_as(QUERY).fetch(ex)
}

pub async fn upsert(ex: &mut PgConnection, row: &Condition) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO conditions (
    condition_id, oracle, outcome_slot_count, parent_collection_id,
    collateral_token, payout_numerators, payout_denominator,
    resolved_at, resolved_block, is_resolved
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (condition_id) DO UPDATE SET
    payout_numerators = EXCLUDED.payout_numerators,
    payout_denominator = EXCLUDED.payout_denominator,
    resolved_at = EXCLUDED.resolved_at,
    resolved_block = EXCLUDED.resolved_block,
    is_resolved = EXCLUDED.is_resolved
"#;
    sqlx::query(QUERY)
        .bind(row.condition_id)
        .bind(row.oracle)
        .bind(row.outcome_slot_count)
        .bind(row.parent_collection_id)
        .bind(row.collateral_token)
        .bind(&row.payout_numerators)
        .bind(&row.payout_denominator)
        .bind(row.resolved_at)
        .bind(row.resolved_block)
        .bind(row.is_resolved)
        .execute(ex)
        .await?;
    Ok(())
}
