//! Mortgage Account Service
//!
//! The only mutation point for mortgage accounts. Every command loads a
//! snapshot, validates against it, and commits the resulting event with a
//! compare-and-swap on the account version. A writer that loses the race
//! reloads and tries again, up to a bounded number of attempts.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{Aggregate, MortgageAccount, MortgageTerms};
use crate::config::Config;
use crate::domain::{
    Amount, DistributionPlan, DomainError, FlexEvent, MortgageEvent, OperationContext,
    RecordedEvent,
};
use crate::engine::{stress, AmortizationRow, AmortizationSchedule, StressForecast};
use crate::error::{AppError, AppResult};
use crate::repository::{AccountRepository, ForecastSource, RepositoryError};

use super::{FlexLimits, LoanSummary, ResetFailure, ResetOutcome};

/// Longest schedule a caller may request
pub const MAX_SCHEDULE_MONTHS: u32 = 600;

/// Longest stress horizon a caller may request
pub const MAX_STRESS_HORIZON_MONTHS: usize = 24;

/// Retry and timeout settings for the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub commit_max_attempts: u32,
    pub commit_timeout: Duration,
    pub stress_horizon_months: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            commit_max_attempts: 3,
            commit_timeout: Duration::from_millis(2000),
            stress_horizon_months: stress::DEFAULT_HORIZON_MONTHS,
        }
    }
}

impl From<&Config> for ServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            commit_max_attempts: config.commit_max_attempts,
            commit_timeout: config.commit_timeout,
            stress_horizon_months: config.stress_horizon_months,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MortgageAccountService {
    repository: AccountRepository,
    forecasts: ForecastSource,
    config: ServiceConfig,
}

impl MortgageAccountService {
    pub fn new(repository: AccountRepository, forecasts: ForecastSource) -> Self {
        Self::with_config(repository, forecasts, ServiceConfig::default())
    }

    pub fn with_config(
        repository: AccountRepository,
        forecasts: ForecastSource,
        config: ServiceConfig,
    ) -> Self {
        Self {
            repository,
            forecasts,
            config,
        }
    }

    pub fn repository(&self) -> &AccountRepository {
        &self.repository
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_account(&self, account_id: Uuid) -> AppResult<MortgageAccount> {
        self.load(account_id).await
    }

    pub async fn list_accounts(&self, owner_id: Uuid) -> AppResult<Vec<MortgageAccount>> {
        Ok(self.repository.list_by_owner(owner_id).await?)
    }

    /// Plan a reduction without committing anything
    pub async fn calculate_flex(
        &self,
        account_id: Uuid,
        reduction: Amount,
    ) -> AppResult<DistributionPlan> {
        let account = self.load(account_id).await?;
        Ok(account.plan_flex(reduction.value(), Utc::now())?)
    }

    pub async fn flex_limits(&self, account_id: Uuid) -> AppResult<FlexLimits> {
        let account = self.load(account_id).await?;
        Ok(FlexLimits::for_account(&account))
    }

    /// Project `months` payments from the current balance
    pub async fn schedule(&self, account_id: Uuid, months: u32) -> AppResult<Vec<AmortizationRow>> {
        if months == 0 || months > MAX_SCHEDULE_MONTHS {
            return Err(AppError::InvalidRequest(format!(
                "months must be between 1 and {} (got {})",
                MAX_SCHEDULE_MONTHS, months
            )));
        }

        let account = self.load(account_id).await?;
        Ok(AmortizationSchedule::for_account(&account, months)
            .iter()
            .collect())
    }

    pub async fn summary(&self, account_id: Uuid) -> AppResult<LoanSummary> {
        let account = self.load(account_id).await?;
        Ok(LoanSummary::for_account(&account))
    }

    /// Classify the coming months of the account's income/expense forecast.
    ///
    /// Fails with `ForecastUnavailable` when the collaborator has fewer
    /// months than the horizon asks for.
    pub async fn stress_forecast(
        &self,
        account_id: Uuid,
        horizon_months: Option<usize>,
    ) -> AppResult<StressForecast> {
        let horizon = horizon_months.unwrap_or(self.config.stress_horizon_months);
        if horizon == 0 || horizon > MAX_STRESS_HORIZON_MONTHS {
            return Err(AppError::InvalidRequest(format!(
                "horizon must be between 1 and {} months (got {})",
                MAX_STRESS_HORIZON_MONTHS, horizon
            )));
        }

        let account = self.load(account_id).await?;
        let months = self
            .timed(account_id, self.forecasts.monthly_forecast(account_id))
            .await??;

        if months.len() < horizon {
            return Err(DomainError::ForecastUnavailable {
                available: months.len(),
                required: horizon,
            }
            .into());
        }

        Ok(stress::predict(&account, &months, horizon))
    }

    pub async fn events(&self, account_id: Uuid) -> AppResult<Vec<RecordedEvent>> {
        Ok(self
            .timed(account_id, self.repository.events(account_id))
            .await??)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Store a newly originated account
    pub async fn open_account(&self, terms: MortgageTerms) -> AppResult<MortgageAccount> {
        let account = MortgageAccount::open(terms)?;
        self.repository.insert(account.clone()).await?;

        tracing::info!(
            account_id = %account.id(),
            owner_id = %account.owner_id(),
            "Mortgage account opened"
        );

        Ok(account)
    }

    /// Apply a flex reduction and return the recorded flex event
    pub async fn apply_flex(
        &self,
        account_id: Uuid,
        reduction: Amount,
        context: &OperationContext,
    ) -> AppResult<FlexEvent> {
        let reduction = reduction.value();
        let (account, event) = self
            .commit_with_retry(account_id, context, |account, now| {
                account.apply_flex(reduction, now).map(Some)
            })
            .await?;

        let flex_event = match event {
            Some(MortgageEvent::FlexApplied { flex_event, .. }) => flex_event,
            _ => {
                return Err(AppError::Internal(
                    "flex command committed without a flex event".to_string(),
                ))
            }
        };

        tracing::info!(
            account_id = %account_id,
            reduction = %reduction,
            flex_usage_count = account.flex_usage_count(),
            version = account.version(),
            correlation_id = ?context.correlation_id,
            "Flex applied"
        );

        Ok(flex_event)
    }

    pub async fn toggle_flex(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> AppResult<MortgageAccount> {
        let (account, _) = self
            .commit_with_retry(account_id, context, |account, now| {
                Ok(Some(account.toggle_flex(now)))
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            flex_enabled = account.flex_enabled(),
            "Flex toggled"
        );

        Ok(account)
    }

    pub async fn set_max_flex_usage(
        &self,
        account_id: Uuid,
        value: u32,
        context: &OperationContext,
    ) -> AppResult<MortgageAccount> {
        let (account, _) = self
            .commit_with_retry(account_id, context, |account, now| {
                account.set_max_flex_usage(value, now).map(Some)
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            max_flex_usage_per_year = value,
            "Max flex usage changed"
        );

        Ok(account)
    }

    /// Reset the usage counter if `now` is in a later year than the counter.
    ///
    /// Returns `None` when the account was already current.
    pub async fn reset_flex_usage(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        context: &OperationContext,
    ) -> AppResult<Option<MortgageAccount>> {
        let (account, event) = self
            .commit_with_retry(account_id, context, |account, _| {
                Ok(account.reset_flex_usage(now))
            })
            .await?;

        match event {
            Some(MortgageEvent::FlexUsageReset {
                year,
                previous_count,
                ..
            }) => {
                tracing::info!(
                    account_id = %account_id,
                    year,
                    previous_count,
                    "Flex usage reset for new year"
                );
                Ok(Some(account))
            }
            _ => Ok(None),
        }
    }

    /// Run the yearly reset over every stored account
    pub async fn reset_all_flex_usage(
        &self,
        now: DateTime<Utc>,
        context: &OperationContext,
    ) -> AppResult<ResetOutcome> {
        let mut outcome = ResetOutcome::default();

        for account_id in self.repository.account_ids().await? {
            outcome.accounts_checked += 1;
            match self.reset_flex_usage(account_id, now, context).await {
                Ok(Some(_)) => outcome.counters_reset += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        account_id = %account_id,
                        error = %e,
                        "Flex usage reset failed, continuing with next account"
                    );
                    outcome.failures.push(ResetFailure {
                        account_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load(&self, account_id: Uuid) -> AppResult<MortgageAccount> {
        Ok(self
            .timed(account_id, self.repository.load(account_id))
            .await??)
    }

    /// Run one load or commit under the configured timeout
    async fn timed<T>(
        &self,
        account_id: Uuid,
        operation: impl Future<Output = Result<T, RepositoryError>>,
    ) -> AppResult<Result<T, RepositoryError>> {
        tokio::time::timeout(self.config.commit_timeout, operation)
            .await
            .map_err(|_| {
                tracing::warn!(account_id = %account_id, "Repository operation timed out");
                AppError::CommitTimeout {
                    account_id,
                    timeout_ms: self.config.commit_timeout.as_millis() as u64,
                }
            })
    }

    /// Load, decide and commit, retrying on version conflicts.
    ///
    /// `decide` returns the event to commit, or `None` when there is nothing
    /// to do. Validation errors are returned before any write.
    async fn commit_with_retry<F>(
        &self,
        account_id: Uuid,
        context: &OperationContext,
        decide: F,
    ) -> AppResult<(MortgageAccount, Option<MortgageEvent>)>
    where
        F: Fn(&MortgageAccount, DateTime<Utc>) -> Result<Option<MortgageEvent>, DomainError>,
    {
        let max_attempts = self.config.commit_max_attempts.max(1);

        for attempt in 0..max_attempts {
            let account = self.load(account_id).await?;

            let Some(event) = decide(&account, Utc::now())? else {
                return Ok((account, None));
            };

            let expected_version = account.version();
            let updated = account.apply(event.clone());
            let recorded = RecordedEvent::new(updated.version(), event.clone(), context);

            match self
                .timed(
                    account_id,
                    self.repository.commit(expected_version, &updated, &recorded),
                )
                .await?
            {
                Ok(()) => return Ok((updated, Some(event))),
                Err(RepositoryError::ConcurrencyConflict { actual, .. }) => {
                    tracing::warn!(
                        account_id = %account_id,
                        expected_version,
                        actual_version = actual,
                        "Concurrency conflict, retrying (attempt {}/{})",
                        attempt + 1,
                        max_attempts
                    );
                    if attempt + 1 < max_attempts {
                        let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            account_id = %account_id,
            attempts = max_attempts,
            "Commit retries exhausted"
        );

        Err(AppError::RetriesExhausted {
            account_id,
            attempts: max_attempts,
        })
    }
}
