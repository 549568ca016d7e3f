//! Account Repository
//!
//! Stores mortgage accounts and their event logs. Every mutation goes
//! through [`AccountRepository::commit`], a compare-and-swap on the account
//! version that also appends the recorded event.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::aggregate::{Aggregate, MortgageAccount, MortgageTerms};
use crate::domain::{FlexEvent, RecordedEvent};

use super::RepositoryError;

const ACCOUNT_COLUMNS: &str = r#"
    id, owner_id, mortgage_number, original_principal, current_balance,
    monthly_payment, annual_interest_rate, origination_date, maturity_date,
    remaining_months, flex_enabled, max_flex_usage_per_year, flex_usage_count,
    flex_usage_year, flex_history, version
"#;

/// In-memory entry: current snapshot plus its event log
#[derive(Debug, Clone)]
pub struct StoredAccount {
    account: MortgageAccount,
    events: Vec<RecordedEvent>,
}

/// Account store backed by process memory or Postgres
#[derive(Debug, Clone)]
pub enum AccountRepository {
    Memory(Arc<RwLock<HashMap<Uuid, StoredAccount>>>),
    Postgres(PgPool),
}

impl AccountRepository {
    pub fn in_memory() -> Self {
        AccountRepository::Memory(Arc::new(RwLock::new(HashMap::new())))
    }

    pub fn postgres(pool: PgPool) -> Self {
        AccountRepository::Postgres(pool)
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AccountRepository::Memory(_) => "memory",
            AccountRepository::Postgres(_) => "postgres",
        }
    }

    /// Load the current snapshot of an account
    pub async fn load(&self, account_id: Uuid) -> Result<MortgageAccount, RepositoryError> {
        match self {
            AccountRepository::Memory(store) => store
                .read()
                .await
                .get(&account_id)
                .map(|stored| stored.account.clone())
                .ok_or(RepositoryError::AccountNotFound(account_id)),

            AccountRepository::Postgres(pool) => {
                let row = sqlx::query(&format!(
                    "SELECT {} FROM mortgage_accounts WHERE id = $1",
                    ACCOUNT_COLUMNS
                ))
                .bind(account_id)
                .fetch_optional(pool)
                .await?
                .ok_or(RepositoryError::AccountNotFound(account_id))?;

                account_from_row(&row)
            }
        }
    }

    /// Every account held by an owner, ordered by mortgage number
    pub async fn list_by_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<MortgageAccount>, RepositoryError> {
        match self {
            AccountRepository::Memory(store) => {
                let mut accounts: Vec<_> = store
                    .read()
                    .await
                    .values()
                    .filter(|stored| stored.account.owner_id() == owner_id)
                    .map(|stored| stored.account.clone())
                    .collect();
                accounts.sort_by(|a, b| a.mortgage_number().cmp(b.mortgage_number()));
                Ok(accounts)
            }

            AccountRepository::Postgres(pool) => {
                let rows = sqlx::query(&format!(
                    "SELECT {} FROM mortgage_accounts WHERE owner_id = $1 ORDER BY mortgage_number",
                    ACCOUNT_COLUMNS
                ))
                .bind(owner_id)
                .fetch_all(pool)
                .await?;

                rows.iter().map(account_from_row).collect()
            }
        }
    }

    /// Ids of every stored account
    pub async fn account_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        match self {
            AccountRepository::Memory(store) => {
                let mut ids: Vec<Uuid> = store.read().await.keys().copied().collect();
                ids.sort();
                Ok(ids)
            }

            AccountRepository::Postgres(pool) => {
                let ids = sqlx::query_scalar("SELECT id FROM mortgage_accounts ORDER BY id")
                    .fetch_all(pool)
                    .await?;
                Ok(ids)
            }
        }
    }

    /// Store a newly opened account
    pub async fn insert(&self, account: MortgageAccount) -> Result<(), RepositoryError> {
        match self {
            AccountRepository::Memory(store) => {
                let mut store = store.write().await;
                if store.contains_key(&account.id()) {
                    return Err(RepositoryError::AccountExists(account.id()));
                }
                store.insert(
                    account.id(),
                    StoredAccount {
                        account,
                        events: Vec::new(),
                    },
                );
                Ok(())
            }

            AccountRepository::Postgres(pool) => {
                let terms = account.terms();
                let history = serde_json::to_value(account.flex_history())?;

                let result = sqlx::query(
                    r#"
                    INSERT INTO mortgage_accounts (
                        id, owner_id, mortgage_number, original_principal, current_balance,
                        monthly_payment, annual_interest_rate, origination_date, maturity_date,
                        remaining_months, flex_enabled, max_flex_usage_per_year, flex_usage_count,
                        flex_usage_year, flex_history, version
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(terms.id)
                .bind(terms.owner_id)
                .bind(&terms.mortgage_number)
                .bind(terms.original_principal)
                .bind(terms.current_balance)
                .bind(terms.monthly_payment)
                .bind(terms.annual_interest_rate)
                .bind(terms.origination_date)
                .bind(terms.maturity_date)
                .bind(to_db_int(terms.remaining_months, "remaining_months")?)
                .bind(terms.flex_enabled)
                .bind(to_db_int(terms.max_flex_usage_per_year, "max_flex_usage_per_year")?)
                .bind(to_db_int(terms.flex_usage_count, "flex_usage_count")?)
                .bind(terms.flex_usage_year)
                .bind(history)
                .bind(account.version())
                .execute(pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(RepositoryError::AccountExists(account.id()));
                }
                Ok(())
            }
        }
    }

    /// Replace the stored account with `updated` if it is still at
    /// `expected_version`, and append `event` to its log.
    ///
    /// Either both writes happen or neither does.
    pub async fn commit(
        &self,
        expected_version: i64,
        updated: &MortgageAccount,
        event: &RecordedEvent,
    ) -> Result<(), RepositoryError> {
        let account_id = updated.id();

        match self {
            AccountRepository::Memory(store) => {
                let mut store = store.write().await;
                let stored = store
                    .get_mut(&account_id)
                    .ok_or(RepositoryError::AccountNotFound(account_id))?;

                let actual = stored.account.version();
                if actual != expected_version {
                    return Err(RepositoryError::ConcurrencyConflict {
                        account_id,
                        expected: expected_version,
                        actual,
                    });
                }

                stored.account = updated.clone();
                stored.events.push(event.clone());
                Ok(())
            }

            AccountRepository::Postgres(pool) => {
                let terms = updated.terms();
                let history = serde_json::to_value(updated.flex_history())?;
                let event_data = serde_json::to_value(&event.event)?;
                let context = serde_json::to_value(&event.context)?;

                let mut tx = pool.begin().await?;

                let result = sqlx::query(
                    r#"
                    UPDATE mortgage_accounts
                    SET current_balance = $3,
                        remaining_months = $4,
                        flex_enabled = $5,
                        max_flex_usage_per_year = $6,
                        flex_usage_count = $7,
                        flex_usage_year = $8,
                        flex_history = $9,
                        version = $10,
                        updated_at = NOW()
                    WHERE id = $1 AND version = $2
                    "#,
                )
                .bind(account_id)
                .bind(expected_version)
                .bind(terms.current_balance)
                .bind(to_db_int(terms.remaining_months, "remaining_months")?)
                .bind(terms.flex_enabled)
                .bind(to_db_int(terms.max_flex_usage_per_year, "max_flex_usage_per_year")?)
                .bind(to_db_int(terms.flex_usage_count, "flex_usage_count")?)
                .bind(terms.flex_usage_year)
                .bind(history)
                .bind(updated.version())
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    let actual: Option<i64> =
                        sqlx::query_scalar("SELECT version FROM mortgage_accounts WHERE id = $1")
                            .bind(account_id)
                            .fetch_optional(&mut *tx)
                            .await?;

                    // Dropping the transaction rolls it back
                    return Err(match actual {
                        Some(actual) => RepositoryError::ConcurrencyConflict {
                            account_id,
                            expected: expected_version,
                            actual,
                        },
                        None => RepositoryError::AccountNotFound(account_id),
                    });
                }

                sqlx::query(
                    r#"
                    INSERT INTO mortgage_events (
                        id, account_id, version, event_type, event_data, context, recorded_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(event.id)
                .bind(event.account_id)
                .bind(event.version)
                .bind(&event.event_type)
                .bind(event_data)
                .bind(context)
                .bind(event.recorded_at)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            }
        }
    }

    /// Event log of an account, oldest first
    pub async fn events(&self, account_id: Uuid) -> Result<Vec<RecordedEvent>, RepositoryError> {
        match self {
            AccountRepository::Memory(store) => store
                .read()
                .await
                .get(&account_id)
                .map(|stored| stored.events.clone())
                .ok_or(RepositoryError::AccountNotFound(account_id)),

            AccountRepository::Postgres(pool) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM mortgage_accounts WHERE id = $1)",
                )
                .bind(account_id)
                .fetch_one(pool)
                .await?;

                if !exists {
                    return Err(RepositoryError::AccountNotFound(account_id));
                }

                let rows = sqlx::query(
                    r#"
                    SELECT id, account_id, version, event_type, event_data, context, recorded_at
                    FROM mortgage_events
                    WHERE account_id = $1
                    ORDER BY version ASC
                    "#,
                )
                .bind(account_id)
                .fetch_all(pool)
                .await?;

                rows.iter().map(event_from_row).collect()
            }
        }
    }
}

/// Read a JSON array of account terms, as used to seed the in-memory store
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<MortgageTerms>, RepositoryError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

fn account_from_row(row: &PgRow) -> Result<MortgageAccount, RepositoryError> {
    let terms = MortgageTerms {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        mortgage_number: row.try_get("mortgage_number")?,
        original_principal: row.try_get("original_principal")?,
        current_balance: row.try_get("current_balance")?,
        monthly_payment: row.try_get("monthly_payment")?,
        annual_interest_rate: row.try_get("annual_interest_rate")?,
        origination_date: row.try_get("origination_date")?,
        maturity_date: row.try_get("maturity_date")?,
        remaining_months: from_db_int(row.try_get("remaining_months")?, "remaining_months")?,
        flex_enabled: row.try_get("flex_enabled")?,
        max_flex_usage_per_year: from_db_int(
            row.try_get("max_flex_usage_per_year")?,
            "max_flex_usage_per_year",
        )?,
        flex_usage_count: from_db_int(row.try_get("flex_usage_count")?, "flex_usage_count")?,
        flex_usage_year: row.try_get("flex_usage_year")?,
    };

    let history: serde_json::Value = row.try_get("flex_history")?;
    let flex_history: Vec<FlexEvent> = serde_json::from_value(history)?;
    let version: i64 = row.try_get("version")?;

    MortgageAccount::restore(terms, flex_history, version)
        .map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

fn event_from_row(row: &PgRow) -> Result<RecordedEvent, RepositoryError> {
    let event_data: serde_json::Value = row.try_get("event_data")?;
    let context: serde_json::Value = row.try_get("context")?;

    Ok(RecordedEvent {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        version: row.try_get("version")?,
        event_type: row.try_get("event_type")?,
        event: serde_json::from_value(event_data)?,
        context: serde_json::from_value(context)?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn to_db_int(value: u32, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::InvalidData(format!("{} out of range: {}", column, value)))
}

fn from_db_int(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::InvalidData(format!("{} is negative: {}", column, value)))
}
