pub mod adapter_events;
pub mod byte_array;
pub mod conditions;
pub mod fees;
pub mod ledger;
pub mod merges;
pub mod neg_risk_markets;
pub mod rankings;
pub mod redemptions;
pub mod snapshots;
pub mod splits;
pub mod trades;
pub mod transfers;

use {
    byte_array::ByteArray,
    sqlx::{Executor, PgPool},
};

// Functions that run several statements take `&mut PgTransaction` so the
// caller decides the commit boundary; single-statement functions take
// `&mut PgConnection`. The parameter is called `ex` after the sqlx
// `Executor` trait. `PgTransaction` derefs to `PgConnection`, so a
// transaction can be passed to either kind.
//
// Tests that need the database open a transaction, never commit it, and
// rely on the rollback-on-drop to leave no trace. That lets them run in
// parallel against one local postgres.

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// The names of all tables we use in the db.
pub const ALL_TABLES: &[&str] = &[
    "trades",
    "splits",
    "merges",
    "redemptions",
    "adapter_splits",
    "adapter_merges",
    "adapter_redemptions",
    "adapter_conversions",
    "transfers",
    "fee_refunds",
    "fee_withdrawals",
    "conditions",
    "neg_risk_markets",
    "wallet_ledger",
    "wallet_snapshots",
    "wallet_rankings",
];

/// Delete all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    for table in ALL_TABLES {
        ex.execute(format!("TRUNCATE {table};").as_str()).await?;
    }
    Ok(())
}

/// Like above but more ergonomic for tests that hold a pool.
#[allow(non_snake_case)]
pub async fn clear_DANGER(pool: &PgPool) -> sqlx::Result<()> {
    let mut transaction = pool.begin().await?;
    clear_DANGER_(&mut transaction).await?;
    transaction.commit().await
}

pub type Address = ByteArray<20>;
pub type TransactionHash = ByteArray<32>;
pub type ConditionId = ByteArray<32>;
pub type MarketId = ByteArray<32>;
