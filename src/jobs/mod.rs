//! Scheduled Jobs
//!
//! Background maintenance for mortgage accounts. The yearly flex reset
//! commits through the service, so it is versioned like any user command
//! and cannot overwrite a flex applied at the same moment.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::service::{MortgageAccountService, ResetOutcome};

const FLEX_RESET_JOB: &str = "flex_usage_reset";

// =========================================================================
// Yearly flex usage reset
// =========================================================================

/// Reset the flex usage counter of every account whose counter belongs to
/// an earlier calendar year than `now`.
pub async fn reset_flex_usage_counters(
    service: &MortgageAccountService,
    now: DateTime<Utc>,
) -> Result<ResetOutcome, JobError> {
    let context = OperationContext::system(FLEX_RESET_JOB);
    let outcome = service.reset_all_flex_usage(now, &context).await?;

    if outcome.counters_reset > 0 || !outcome.failures.is_empty() {
        tracing::info!(
            accounts_checked = outcome.accounts_checked,
            counters_reset = outcome.counters_reset,
            failed = outcome.failures.len(),
            correlation_id = ?context.correlation_id,
            "Reset yearly flex usage counters"
        );
    }

    Ok(outcome)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for the flex reset check (default: 1 hour)
    pub flex_reset_check_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            flex_reset_check_interval: Duration::from_secs(3600),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    service: MortgageAccountService,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(service: MortgageAccountService) -> Self {
        Self::with_config(service, JobSchedulerConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(service: MortgageAccountService, config: JobSchedulerConfig) -> Self {
        Self { service, config }
    }

    /// Start the job scheduler in the background.
    ///
    /// The loop stops once `shutdown` changes or its sender is dropped.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.config.flex_reset_check_interval.as_secs(),
            "Job scheduler started"
        );

        let mut reset_interval = interval(self.config.flex_reset_check_interval);
        reset_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = reset_interval.tick() => {
                    if let Err(e) = reset_flex_usage_counters(&self.service, Utc::now()).await {
                        tracing::error!(error = %e, "Flex usage reset failed");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Job scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match reset_flex_usage_counters(&self.service, now).await {
            Ok(outcome) => {
                report.accounts_checked = outcome.accounts_checked;
                report.flex_counters_reset = outcome.counters_reset;
                report.errors.extend(outcome.failures.into_iter().map(|f| {
                    format!("Flex usage reset for {}: {}", f.account_id, f.error)
                }));
            }
            Err(e) => report.errors.push(format!("Flex usage reset: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub accounts_checked: usize,
    pub flex_counters_reset: usize,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Service error: {0}")]
    Service(#[from] AppError),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::mortgage::tests::sample_terms;
    use crate::repository::{AccountRepository, ForecastSource};
    use chrono::TimeZone;

    async fn service_with_exhausted_account() -> MortgageAccountService {
        let service =
            MortgageAccountService::new(AccountRepository::in_memory(), ForecastSource::Unavailable);
        let mut terms = sample_terms();
        terms.flex_usage_count = 3;
        service.open_account(terms).await.unwrap();
        service.open_account(sample_terms()).await.unwrap();
        service
    }

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.flex_reset_check_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert_eq!(report.flex_counters_reset, 0);
        assert_eq!(report.errors.len(), 0);
    }

    #[tokio::test]
    async fn test_run_all_once_resets_new_year() {
        let scheduler = JobScheduler::new(service_with_exhausted_account().await);

        let report = scheduler
            .run_all_once(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap())
            .await;
        assert_eq!(report.accounts_checked, 2);
        assert_eq!(report.flex_counters_reset, 0);

        // Both accounts carry the 2026 counter, so both roll over
        let report = scheduler
            .run_all_once(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap())
            .await;
        assert_eq!(report.flex_counters_reset, 2);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = JobScheduler::new(service_with_exhausted_account().await).start(rx);

        tx.send(true).unwrap();
        tokio_test::assert_ok!(handle.await);
    }
}
