//! Flex redistribution planner
//!
//! Spreads a one-month payment reduction, plus the interest the deferred
//! amount accrues for one period, evenly over every month after the flex
//! month.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::aggregate::{Aggregate, MortgageAccount};
use crate::domain::{round_up_money, DistributionPlan, DomainError, MonthlyAdjustment};

use super::amortization::monthly_rate;

/// Smallest reduction a borrower may request
pub const MIN_REDUCTION: Decimal = dec!(100);

/// Absolute ceiling on a single reduction
pub const MAX_REDUCTION_CAP: Decimal = dec!(3000);

/// Largest share of the monthly payment that may be deferred
pub const MAX_REDUCTION_SHARE: Decimal = dec!(0.5);

/// Remaining months needed to have at least one month to spread over
const MIN_REMAINING_MONTHS: u32 = 2;

/// Largest reduction allowed for a given monthly payment
pub fn max_reduction(monthly_payment: Decimal) -> Decimal {
    (monthly_payment * MAX_REDUCTION_SHARE).min(MAX_REDUCTION_CAP)
}

/// Validate a requested reduction against the account and plan its repayment.
///
/// Checks run in a fixed order (amount band, flex enabled, usage left,
/// term left) and the first failure is returned.
pub fn calculate(
    account: &MortgageAccount,
    reduction_amount: Decimal,
) -> Result<DistributionPlan, DomainError> {
    let max = max_reduction(account.monthly_payment());
    if reduction_amount < MIN_REDUCTION || reduction_amount > max {
        return Err(DomainError::InvalidReductionAmount {
            amount: reduction_amount,
            min: MIN_REDUCTION,
            max,
        });
    }

    if !account.flex_enabled() {
        return Err(DomainError::FlexDisabled {
            account_id: account.id(),
        });
    }

    if !account.has_flex_uses_left() {
        return Err(DomainError::UsageLimitExceeded {
            used: account.flex_usage_count(),
            max: account.max_flex_usage_per_year(),
        });
    }

    if account.remaining_months() < MIN_REMAINING_MONTHS {
        return Err(DomainError::InsufficientTerm {
            remaining_months: account.remaining_months(),
        });
    }

    Ok(redistribute(
        reduction_amount,
        account.annual_interest_rate(),
        account.remaining_months() - 1,
    ))
}

/// Equal-installment spread of `reduction + one period of interest` over
/// `months` months. Installments are rounded up so the plan never collects
/// less than it defers.
fn redistribute(reduction_amount: Decimal, annual_rate: Decimal, months: u32) -> DistributionPlan {
    let monthly_rate = monthly_rate(annual_rate);
    let accrued_interest = reduction_amount * monthly_rate;
    let total_to_redistribute = reduction_amount + accrued_interest;

    let n = Decimal::from(months);
    let additional_amount = round_up_money(total_to_redistribute / n);

    let adjustments = (1..=months)
        .map(|month| MonthlyAdjustment {
            month,
            additional_amount,
        })
        .collect();

    let total_additional = additional_amount * n;

    DistributionPlan {
        reduction_amount,
        monthly_rate,
        accrued_interest,
        total_to_redistribute,
        adjustments,
        total_additional,
        total_interest_added: total_additional - reduction_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::mortgage::tests::{sample_account, sample_terms};
    use crate::aggregate::MortgageTerms;
    use chrono::Utc;

    fn account_with(f: impl FnOnce(&mut MortgageTerms)) -> MortgageAccount {
        let mut terms = sample_terms();
        f(&mut terms);
        MortgageAccount::open(terms).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        // payment 5000, rate 3.6%, 120 months left, reduce by 500
        let plan = calculate(&sample_account(), dec!(500)).unwrap();

        assert_eq!(plan.monthly_rate, dec!(0.003));
        assert_eq!(plan.accrued_interest, dec!(1.5));
        assert_eq!(plan.total_to_redistribute, dec!(501.5));
        assert_eq!(plan.months(), 119);
        assert_eq!(plan.adjustments[0].month, 1);
        assert_eq!(plan.adjustments[118].month, 119);

        let additional = plan.adjustments[0].additional_amount;
        assert!((additional - dec!(4.2143)).abs() < dec!(0.0001));
        assert!((plan.total_interest_added - dec!(1.5)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_plan_never_under_collects() {
        let account = account_with(|t| t.annual_interest_rate = Decimal::ZERO);

        for reduction in [dec!(100), dec!(333.33), dec!(1234.56789), dec!(2500)] {
            let plan = calculate(&account, reduction).unwrap();
            let sum: Decimal = plan.adjustments.iter().map(|a| a.additional_amount).sum();

            assert_eq!(sum, plan.total_additional);
            assert!(sum >= reduction);
            assert!(plan.total_interest_added >= Decimal::ZERO);
            assert!(plan.adjustments.iter().all(|a| a.additional_amount >= Decimal::ZERO));
        }
    }

    #[test]
    fn test_calculate_is_pure() {
        let account = sample_account();
        let first = calculate(&account, dec!(750)).unwrap();
        let second = calculate(&account, dec!(750)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_boundaries() {
        // 0.5 * 5000 = 2500 is below the 3000 cap
        let account = sample_account();
        assert!(calculate(&account, dec!(100)).is_ok());
        assert!(calculate(&account, dec!(2500)).is_ok());

        for rejected in [dec!(99), dec!(2501), dec!(99.99999999), dec!(0), dec!(-5), dec!(100000001)] {
            assert!(matches!(
                calculate(&account, rejected),
                Err(DomainError::InvalidReductionAmount { max, .. }) if max == dec!(2500)
            ));
        }

        // Large payment: the 3000 cap applies
        let account = account_with(|t| t.monthly_payment = dec!(9000));
        assert!(calculate(&account, dec!(3000)).is_ok());
        assert!(matches!(
            calculate(&account, dec!(3001)),
            Err(DomainError::InvalidReductionAmount { max, .. }) if max == dec!(3000)
        ));
    }

    #[test]
    fn test_validation_order() {
        // Amount is checked before the flex switch
        let disabled = account_with(|t| t.flex_enabled = false);
        assert!(matches!(
            calculate(&disabled, dec!(50)),
            Err(DomainError::InvalidReductionAmount { .. })
        ));
        assert!(matches!(
            calculate(&disabled, dec!(500)),
            Err(DomainError::FlexDisabled { account_id }) if account_id == disabled.id()
        ));

        let exhausted = account_with(|t| t.flex_usage_count = 3);
        assert!(matches!(
            calculate(&exhausted, dec!(500)),
            Err(DomainError::UsageLimitExceeded { used: 3, max: 3 })
        ));

        let short = account_with(|t| t.remaining_months = 1);
        assert!(matches!(
            calculate(&short, dec!(500)),
            Err(DomainError::InsufficientTerm { remaining_months: 1 })
        ));

        let done = account_with(|t| t.remaining_months = 0);
        assert!(matches!(
            calculate(&done, dec!(500)),
            Err(DomainError::InsufficientTerm { remaining_months: 0 })
        ));
    }

    #[test]
    fn test_two_months_left_spreads_over_one() {
        let account = account_with(|t| t.remaining_months = 2);
        let plan = calculate(&account, dec!(1000)).unwrap();
        assert_eq!(plan.months(), 1);
        assert_eq!(plan.adjustments[0].additional_amount, dec!(1003));
    }

    #[test]
    fn test_usage_cap_after_applies() {
        let now = Utc::now();
        let mut account = sample_account();
        for _ in 0..3 {
            let event = account.apply_flex(dec!(500), now).unwrap();
            account = account.apply(event);
        }
        assert!(matches!(
            calculate(&account, dec!(500)),
            Err(DomainError::UsageLimitExceeded { .. })
        ));
    }
}
