//! Service result types
//!
//! Read models returned by the account service.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::mortgage::MAX_FLEX_USAGE_CHOICES;
use crate::aggregate::{Aggregate, FlexState, MortgageAccount};
use crate::engine::{flex, AmortizationSchedule};

/// Account snapshot with its derived flex state
#[derive(Debug, Clone, Serialize)]
pub struct AccountSnapshot {
    #[serde(flatten)]
    pub account: MortgageAccount,
    pub flex_state: FlexState,
    pub remaining_flex_uses: u32,
}

impl From<MortgageAccount> for AccountSnapshot {
    fn from(account: MortgageAccount) -> Self {
        Self {
            flex_state: account.flex_state(),
            remaining_flex_uses: account.remaining_flex_uses(),
            account,
        }
    }
}

/// Bounds a client needs to offer a flex reduction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlexLimits {
    pub account_id: Uuid,
    pub flex_enabled: bool,
    pub flex_state: FlexState,
    pub min_reduction: Decimal,
    pub max_reduction: Decimal,
    pub flex_usage_count: u32,
    pub max_flex_usage_per_year: u32,
    pub remaining_flex_uses: u32,
    pub allowed_max_flex_usage: Vec<u32>,
}

impl FlexLimits {
    pub fn for_account(account: &MortgageAccount) -> Self {
        Self {
            account_id: account.id(),
            flex_enabled: account.flex_enabled(),
            flex_state: account.flex_state(),
            min_reduction: flex::MIN_REDUCTION,
            max_reduction: flex::max_reduction(account.monthly_payment()),
            flex_usage_count: account.flex_usage_count(),
            max_flex_usage_per_year: account.max_flex_usage_per_year(),
            remaining_flex_uses: account.remaining_flex_uses(),
            allowed_max_flex_usage: MAX_FLEX_USAGE_CHOICES.to_vec(),
        }
    }
}

/// Progress of a loan from origination to today
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanSummary {
    pub account_id: Uuid,
    pub original_principal: Decimal,
    pub current_balance: Decimal,
    pub total_principal_paid: Decimal,
    /// Share of the original principal repaid, in percent with 2 decimals
    pub percent_paid: Decimal,
    pub original_term_months: u32,
    pub elapsed_months: u32,
    pub remaining_months: u32,
    /// `monthly_payment * original_term_months - original_principal`
    pub estimated_total_interest: Decimal,
    /// Balance left once every remaining payment is made
    pub projected_balance_after_term: Decimal,
    pub negative_amortization: bool,
}

impl LoanSummary {
    pub fn for_account(account: &MortgageAccount) -> Self {
        let total_principal_paid = account.original_principal() - account.current_balance();
        let percent_paid = (total_principal_paid / account.original_principal()
            * Decimal::ONE_HUNDRED)
            .round_dp(2);

        let original_term_months = account.original_term_months();
        let estimated_total_interest = account.monthly_payment()
            * Decimal::from(original_term_months)
            - account.original_principal();

        let projection =
            AmortizationSchedule::for_account(account, account.remaining_months()).totals();

        Self {
            account_id: account.id(),
            original_principal: account.original_principal(),
            current_balance: account.current_balance(),
            total_principal_paid,
            percent_paid,
            original_term_months,
            elapsed_months: account.elapsed_months(),
            remaining_months: account.remaining_months(),
            estimated_total_interest,
            projected_balance_after_term: projection.closing_balance,
            negative_amortization: projection.negative_amortization_months > 0,
        }
    }
}

/// Outcome of a yearly flex reset over every account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub accounts_checked: usize,
    pub counters_reset: usize,
    /// Accounts left unreset; retried on the next run
    pub failures: Vec<ResetFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetFailure {
    pub account_id: Uuid,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::mortgage::tests::sample_account;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_serializes_flat() {
        let snapshot = AccountSnapshot::from(sample_account());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["flex_state"], "flex_on_available");
        assert_eq!(json["remaining_flex_uses"], 3);
        assert_eq!(json["monthly_payment"], "5000");
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn test_flex_limits() {
        let account = sample_account();
        let limits = FlexLimits::for_account(&account);
        assert_eq!(limits.min_reduction, dec!(100));
        assert_eq!(limits.max_reduction, dec!(2500));
        assert_eq!(limits.allowed_max_flex_usage, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_loan_summary() {
        let account = sample_account();
        let summary = LoanSummary::for_account(&account);

        assert_eq!(summary.total_principal_paid, dec!(520000));
        assert_eq!(summary.percent_paid, dec!(52.00));
        assert_eq!(summary.original_term_months, 240);
        assert_eq!(summary.elapsed_months, 120);
        assert_eq!(summary.estimated_total_interest, dec!(200000));
        // 5000 a month easily clears 480000 at 3.6% within 120 months
        assert_eq!(summary.projected_balance_after_term, Decimal::ZERO);
        assert!(!summary.negative_amortization);
    }
}
