//! Financial stress predictor
//!
//! Classifies each forecast month by the ratio of predicted expenses to
//! predicted income, and flags months where a flex reduction is both likely
//! needed and still available.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, MortgageAccount};

pub const DEFAULT_HORIZON_MONTHS: usize = 3;

/// Floor for income so a zero or negative income month scores as fully stressed
const INCOME_EPSILON: Decimal = dec!(0.01);

const MODERATE_THRESHOLD: Decimal = dec!(0.4);
const HIGH_THRESHOLD: Decimal = dec!(0.6);
const CRITICAL_THRESHOLD: Decimal = dec!(0.8);

/// One month of the external income/expense forecast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeExpenseMonth {
    /// First day of the forecast month
    pub month: NaiveDate,
    pub predicted_income: Decimal,
    pub predicted_expenses: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl StressLevel {
    pub fn from_score(score: Decimal) -> Self {
        if score >= CRITICAL_THRESHOLD {
            StressLevel::Critical
        } else if score >= HIGH_THRESHOLD {
            StressLevel::High
        } else if score >= MODERATE_THRESHOLD {
            StressLevel::Moderate
        } else {
            StressLevel::Low
        }
    }

    pub fn is_elevated(self) -> bool {
        matches!(self, StressLevel::High | StressLevel::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyForecast {
    pub month: NaiveDate,
    pub predicted_income: Decimal,
    pub predicted_expenses: Decimal,
    /// In [0, 1]
    pub stress_score: Decimal,
    pub stress_level: StressLevel,
    pub likely_flex_candidate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressForecast {
    pub account_id: Uuid,
    pub months: Vec<MonthlyForecast>,
}

impl StressForecast {
    /// True if any month is flagged as a flex candidate
    pub fn suggests_flex(&self) -> bool {
        self.months.iter().any(|m| m.likely_flex_candidate)
    }

    pub fn peak_level(&self) -> Option<StressLevel> {
        self.months.iter().map(|m| m.stress_level).max()
    }
}

/// `clamp(expenses / max(income, epsilon), 0, 1)`
pub fn stress_score(predicted_income: Decimal, predicted_expenses: Decimal) -> Decimal {
    let income = predicted_income.max(INCOME_EPSILON);
    predicted_expenses
        .checked_div(income)
        .unwrap_or(if predicted_expenses.is_sign_negative() {
            Decimal::ZERO
        } else {
            Decimal::ONE
        })
        .clamp(Decimal::ZERO, Decimal::ONE)
}

/// Classify the first `horizon_months` months of `forecast`, in input order.
pub fn predict(
    account: &MortgageAccount,
    forecast: &[IncomeExpenseMonth],
    horizon_months: usize,
) -> StressForecast {
    let flex_available = account.flex_enabled() && account.has_flex_uses_left();

    let months = forecast
        .iter()
        .take(horizon_months)
        .map(|m| {
            let stress_score = stress_score(m.predicted_income, m.predicted_expenses);
            let stress_level = StressLevel::from_score(stress_score);
            MonthlyForecast {
                month: m.month,
                predicted_income: m.predicted_income,
                predicted_expenses: m.predicted_expenses,
                stress_score,
                stress_level,
                likely_flex_candidate: stress_level.is_elevated() && flex_available,
            }
        })
        .collect();

    StressForecast {
        account_id: account.id(),
        months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::mortgage::tests::sample_terms;

    fn month(m: u32, income: Decimal, expenses: Decimal) -> IncomeExpenseMonth {
        IncomeExpenseMonth {
            month: NaiveDate::from_ymd_opt(2026, m, 1).unwrap(),
            predicted_income: income,
            predicted_expenses: expenses,
        }
    }

    #[test]
    fn test_banding() {
        assert_eq!(StressLevel::from_score(dec!(0)), StressLevel::Low);
        assert_eq!(StressLevel::from_score(dec!(0.3999)), StressLevel::Low);
        assert_eq!(StressLevel::from_score(dec!(0.4)), StressLevel::Moderate);
        assert_eq!(StressLevel::from_score(dec!(0.5999)), StressLevel::Moderate);
        assert_eq!(StressLevel::from_score(dec!(0.6)), StressLevel::High);
        assert_eq!(StressLevel::from_score(dec!(0.7999)), StressLevel::High);
        assert_eq!(StressLevel::from_score(dec!(0.8)), StressLevel::Critical);
        assert_eq!(StressLevel::from_score(dec!(1)), StressLevel::Critical);
    }

    #[test]
    fn test_score_clamps() {
        assert_eq!(stress_score(dec!(10000), dec!(7000)), dec!(0.7));
        assert_eq!(stress_score(dec!(1000), dec!(5000)), Decimal::ONE);
        assert_eq!(stress_score(dec!(1000), dec!(-50)), Decimal::ZERO);
        assert_eq!(stress_score(Decimal::ZERO, dec!(1)), Decimal::ONE);
        assert_eq!(stress_score(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_score_saturates_on_overflow() {
        // MAX / 0.01 does not fit in a Decimal
        assert_eq!(stress_score(Decimal::ZERO, Decimal::MAX), Decimal::ONE);
        assert_eq!(stress_score(dec!(0.001), Decimal::MAX), Decimal::ONE);
        assert_eq!(stress_score(Decimal::ZERO, Decimal::MIN), Decimal::ZERO);
        assert_eq!(
            StressLevel::from_score(stress_score(Decimal::ZERO, Decimal::MAX)),
            StressLevel::Critical
        );
    }

    #[test]
    fn test_high_stress_is_candidate() {
        let account = MortgageAccount::open(sample_terms()).unwrap();
        let forecast = predict(&account, &[month(11, dec!(10000), dec!(7000))], 3);

        let m = &forecast.months[0];
        assert_eq!(m.stress_score, dec!(0.7));
        assert_eq!(m.stress_level, StressLevel::High);
        assert!(m.likely_flex_candidate);
        assert!(forecast.suggests_flex());
    }

    #[test]
    fn test_candidate_requires_available_flex() {
        let mut terms = sample_terms();
        terms.flex_enabled = false;
        let disabled = MortgageAccount::open(terms).unwrap();

        let mut terms = sample_terms();
        terms.flex_usage_count = terms.max_flex_usage_per_year;
        let exhausted = MortgageAccount::open(terms).unwrap();

        let input = [month(11, dec!(10000), dec!(9500))];
        for account in [disabled, exhausted] {
            let forecast = predict(&account, &input, 3);
            assert_eq!(forecast.months[0].stress_level, StressLevel::Critical);
            assert!(!forecast.months[0].likely_flex_candidate);
        }
    }

    #[test]
    fn test_order_and_horizon() {
        let account = MortgageAccount::open(sample_terms()).unwrap();
        let input = [
            month(11, dec!(10000), dec!(2000)),
            month(12, dec!(10000), dec!(5000)),
            month(10, dec!(10000), dec!(9000)),
            month(9, dec!(10000), dec!(9900)),
        ];

        let forecast = predict(&account, &input, DEFAULT_HORIZON_MONTHS);
        let levels: Vec<_> = forecast.months.iter().map(|m| m.stress_level).collect();
        let months: Vec<_> = forecast.months.iter().map(|m| m.month).collect();

        assert_eq!(
            levels,
            vec![StressLevel::Low, StressLevel::Moderate, StressLevel::Critical]
        );
        assert_eq!(months, vec![input[0].month, input[1].month, input[2].month]);
        assert_eq!(forecast.peak_level(), Some(StressLevel::Critical));
    }
}
