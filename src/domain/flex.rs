//! Flex value types
//!
//! The distribution plan a flex reduction produces, and the immutable
//! record kept in an account's flex history once a reduction is applied.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extra amount owed in one month following the flex month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAdjustment {
    /// Month offset after the flex month, starting at 1
    pub month: u32,
    pub additional_amount: Decimal,
}

/// Schedule of extra monthly amounts that repays a reduction plus its interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub reduction_amount: Decimal,
    pub monthly_rate: Decimal,
    pub accrued_interest: Decimal,
    pub total_to_redistribute: Decimal,
    pub adjustments: Vec<MonthlyAdjustment>,
    /// Sum of every `additional_amount`
    pub total_additional: Decimal,
    /// `total_additional - reduction_amount`, never negative
    pub total_interest_added: Decimal,
}

impl DistributionPlan {
    /// Number of months the deferral is spread over
    pub fn months(&self) -> usize {
        self.adjustments.len()
    }
}

/// A committed flex reduction. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlexEvent {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    /// Scheduled payment before the reduction
    pub original_amount: Decimal,
    /// Payment actually due in the flex month
    pub reduced_amount: Decimal,
    pub distribution_plan: DistributionPlan,
}

impl FlexEvent {
    pub fn new(date: DateTime<Utc>, monthly_payment: Decimal, plan: DistributionPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            original_amount: monthly_payment,
            reduced_amount: monthly_payment - plan.reduction_amount,
            distribution_plan: plan,
        }
    }

    pub fn reduction_amount(&self) -> Decimal {
        self.original_amount - self.reduced_amount
    }
}
