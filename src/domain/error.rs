//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations and domain invariant failures.
///
/// Every variant carries the offending value and the bound it broke so the
/// consumer can render an actionable message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Requested reduction is outside the permitted band
    #[error("Invalid reduction amount {amount}: must be between {min} and {max}")]
    InvalidReductionAmount {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// Flex is switched off for this account
    #[error("Flex is disabled for account {account_id}")]
    FlexDisabled { account_id: Uuid },

    /// The yearly flex allowance has been used up
    #[error("Flex usage limit exceeded: {used} of {max} uses this year")]
    UsageLimitExceeded { used: u32, max: u32 },

    /// Not enough months left to spread a deferral over
    #[error("Insufficient term: {remaining_months} remaining months, at least 2 required")]
    InsufficientTerm { remaining_months: u32 },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Aggregate version conflict (optimistic locking)
    #[error("Concurrent modification: expected version {expected}, found {found}")]
    ConcurrentModification { expected: i64, found: i64 },

    /// The external income/expense forecast has too little data
    #[error("Insufficient forecast data: {available} of {required} months available")]
    ForecastUnavailable { available: usize, required: usize },

    /// Max flex usage outside the allowed choices
    #[error("Invalid max flex usage {value}: allowed values are 3, 4, 5, 6")]
    InvalidMaxFlexUsage { value: u32 },

    /// Lowering the cap would leave the account over its allowance
    #[error("Max flex usage {value} is below the {used} uses already taken this year")]
    MaxFlexUsageBelowUsage { value: u32, used: u32 },

    /// Invalid amount (zero, negative, or badly formatted)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account record violates a data model invariant
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
}

impl DomainError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReductionAmount { .. } => "invalid_reduction_amount",
            Self::FlexDisabled { .. } => "flex_disabled",
            Self::UsageLimitExceeded { .. } => "usage_limit_exceeded",
            Self::InsufficientTerm { .. } => "insufficient_term",
            Self::AccountNotFound(_) => "account_not_found",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::ForecastUnavailable { .. } => "insufficient_data",
            Self::InvalidMaxFlexUsage { .. } => "invalid_max_flex_usage",
            Self::MaxFlexUsageBelowUsage { .. } => "max_flex_usage_below_usage",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidAccount(_) => "invalid_account",
        }
    }

    /// Offending value and bound as structured data
    pub fn details(&self) -> Value {
        match self {
            Self::InvalidReductionAmount { amount, min, max } => {
                json!({ "amount": amount, "min": min, "max": max })
            }
            Self::FlexDisabled { account_id } => json!({ "account_id": account_id }),
            Self::UsageLimitExceeded { used, max } => json!({ "used": used, "max": max }),
            Self::InsufficientTerm { remaining_months } => {
                json!({ "remaining_months": remaining_months, "min_remaining_months": 2 })
            }
            Self::AccountNotFound(id) => json!({ "account_id": id }),
            Self::ConcurrentModification { expected, found } => {
                json!({ "expected_version": expected, "found_version": found })
            }
            Self::ForecastUnavailable { available, required } => {
                json!({ "available_months": available, "required_months": required })
            }
            Self::InvalidMaxFlexUsage { value } => {
                json!({ "value": value, "allowed": [3, 4, 5, 6] })
            }
            Self::MaxFlexUsageBelowUsage { value, used } => {
                json!({ "value": value, "used": used })
            }
            Self::InvalidAmount(msg) | Self::InvalidAccount(msg) => json!({ "message": msg }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invalid_reduction_error() {
        let err = DomainError::InvalidReductionAmount {
            amount: dec!(99),
            min: dec!(100),
            max: dec!(2500),
        };

        assert_eq!(err.code(), "invalid_reduction_amount");
        assert!(err.to_string().contains("99"));
        assert!(err.to_string().contains("2500"));
        assert_eq!(err.details()["min"], "100");
        assert_eq!(err.details()["max"], "2500");
    }

    #[test]
    fn test_usage_limit_details() {
        let err = DomainError::UsageLimitExceeded { used: 3, max: 3 };
        assert_eq!(err.code(), "usage_limit_exceeded");
        assert_eq!(err.details()["used"], 3);
        assert_eq!(err.details()["max"], 3);
    }

    #[test]
    fn test_concurrent_modification_error() {
        let err = DomainError::ConcurrentModification {
            expected: 1,
            found: 2,
        };

        assert_eq!(err.code(), "concurrent_modification");
        assert_eq!(err.details()["expected_version"], 1);
        assert_eq!(err.details()["found_version"], 2);
    }

    #[test]
    fn test_forecast_unavailable_code() {
        let err = DomainError::ForecastUnavailable {
            available: 0,
            required: 3,
        };
        assert_eq!(err.code(), "insufficient_data");
        assert_eq!(err.details()["required_months"], 3);
    }
}
