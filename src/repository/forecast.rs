//! Forecast Source
//!
//! Supplies the external income/expense forecast for an account. An account
//! the source knows nothing about yields an empty forecast; deciding whether
//! that is enough data is left to the caller.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::IncomeExpenseMonth;

use super::RepositoryError;

#[derive(Debug, Clone)]
pub enum ForecastSource {
    /// No forecast collaborator configured
    Unavailable,
    /// Fixed forecasts keyed by account id
    Static(Arc<HashMap<Uuid, Vec<IncomeExpenseMonth>>>),
    /// `income_expense_forecasts` table
    Postgres(PgPool),
}

impl ForecastSource {
    pub fn from_map(forecasts: HashMap<Uuid, Vec<IncomeExpenseMonth>>) -> Self {
        ForecastSource::Static(Arc::new(forecasts))
    }

    /// Read a JSON object mapping account ids to monthly forecasts
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let forecasts: HashMap<Uuid, Vec<IncomeExpenseMonth>> = serde_json::from_str(&raw)?;
        Ok(Self::from_map(forecasts))
    }

    /// Forecast months for an account, in the order the collaborator gave them
    pub async fn monthly_forecast(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<IncomeExpenseMonth>, RepositoryError> {
        match self {
            ForecastSource::Unavailable => Ok(Vec::new()),

            ForecastSource::Static(forecasts) => {
                Ok(forecasts.get(&account_id).cloned().unwrap_or_default())
            }

            ForecastSource::Postgres(pool) => {
                let rows: Vec<(chrono::NaiveDate, rust_decimal::Decimal, rust_decimal::Decimal)> =
                    sqlx::query_as(
                        r#"
                        SELECT month, predicted_income, predicted_expenses
                        FROM income_expense_forecasts
                        WHERE account_id = $1 AND month >= date_trunc('month', CURRENT_DATE)::date
                        ORDER BY month ASC
                        "#,
                    )
                    .bind(account_id)
                    .fetch_all(pool)
                    .await?;

                Ok(rows
                    .into_iter()
                    .map(|(month, predicted_income, predicted_expenses)| IncomeExpenseMonth {
                        month,
                        predicted_income,
                        predicted_expenses,
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_source() {
        let account_id = Uuid::new_v4();
        let months = vec![IncomeExpenseMonth {
            month: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            predicted_income: dec!(10000),
            predicted_expenses: dec!(7000),
        }];

        let source = ForecastSource::from_map(HashMap::from([(account_id, months.clone())]));

        assert_eq!(source.monthly_forecast(account_id).await.unwrap(), months);
        assert!(source
            .monthly_forecast(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_source_is_empty() {
        let forecast =
            tokio_test::assert_ok!(ForecastSource::Unavailable.monthly_forecast(Uuid::new_v4()).await);
        assert!(forecast.is_empty());
    }
}
