use {
    crate::{Address, PgTransaction},
    futures::stream::BoxStream,
    sqlx::PgConnection,
};

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct SnapshotRow {
    pub wallet: Address,
    pub at: i64,
    pub realized_cum: f64,
    pub unrealized: f64,
    pub open_cost: f64,
    pub open_value: f64,
    pub cashflow_cum: f64,
    pub open_token_count: i64,
}

pub async fn delete_range(
    ex: &mut PgConnection,
    wallet: &Address,
    start_ts: i64,
    end_ts: i64,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = "DELETE FROM wallet_snapshots WHERE wallet = $1 AND at BETWEEN $2 AND $3";
    sqlx::query(QUERY)
        .bind(wallet)
        .bind(start_ts)
        .bind(end_ts)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn append(ex: &mut PgTransaction<'_>, rows: &[SnapshotRow]) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO wallet_snapshots (
    wallet, at, realized_cum, unrealized, open_cost, open_value,
    cashflow_cum, open_token_count
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT DO NOTHING
"#;
    for row in rows {
        sqlx::query(QUERY)
            .bind(row.wallet)
            .bind(row.at)
            .bind(row.realized_cum)
            .bind(row.unrealized)
            .bind(row.open_cost)
            .bind(row.open_value)
            .bind(row.cashflow_cum)
            .bind(row.open_token_count)
            .execute(&mut **ex)
            .await?;
    }
    Ok(())
}

pub fn for_wallet<'a>(
    ex: &'a mut PgConnection,
    wallet: &'a Address,
) -> BoxStream<'a, Result<SnapshotRow, sqlx::Error>> {
    const QUERY: &str = r#"
SELECT wallet, at, realized_cum, unrealized, open_cost, open_value,
       cashflow_cum, open_token_count
FROM wallet_snapshots
WHERE wallet = $1
ORDER BY wallet, at
"#;
    sqlx::query_as(QUERY).bind(wallet).fetch(ex)
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
    async fn postgres_round_trip_ordered_by_time() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let wallet: Address = ByteArray([1; 20]);
        let early = SnapshotRow {
            wallet,
            at: 3600,
            realized_cum: 8.,
            cashflow_cum: -50.,
            ..Default::default()
        };
        let late = SnapshotRow {
            wallet,
            at: 7200,
            realized_cum: 8.,
            cashflow_cum: -22.,
            ..Default::default()
        };
        append(&mut db, &[late.clone(), early.clone()]).await.unwrap();

        let read: Vec<SnapshotRow> = for_wallet(&mut db, &wallet).try_collect().await.unwrap();
        assert_eq!(read, vec![early, late]);
    }
}
