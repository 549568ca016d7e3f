//! Database module
//!
//! Database connection and schema checks.

use sqlx::PgPool;

/// Tables the Postgres backend reads and writes
const REQUIRED_TABLES: [&str; 3] = [
    "mortgage_accounts",
    "mortgage_events",
    "income_expense_forecasts",
];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mortgage_accounts")
        .fetch_one(pool)
        .await?;
    tracing::info!(accounts, "Database schema verified");

    Ok(true)
}
