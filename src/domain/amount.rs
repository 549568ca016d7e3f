//! Amount type
//!
//! Domain primitive for monetary amounts arriving from callers. Parsing
//! checks the format and the money precision only; whether a value is an
//! acceptable reduction is the flex planner's call, so an out-of-range
//! request is reported with the bounds that apply to the account.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum decimal places carried by money values
pub const MONEY_SCALE: u32 = 8;

/// Amount represents a monetary value at money precision.
///
/// # Invariants
/// - Maximum 8 decimal places (trailing zeros do not count)
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use flex_mortgage::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(500, 0)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(500, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount has too many decimal places (max {MONEY_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::TooManyDecimals` if more than 8 decimal places
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        // Trailing zeros ("500.000000000") are not extra precision
        let normalized = value.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(AmountError::TooManyDecimals(normalized.scale()));
        }

        Ok(Self(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// Round a money value up (away from zero) to the money scale.
///
/// Used wherever a computed installment must never under-collect.
pub fn round_up_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::AwayFromZero)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_keeps_value() {
        let amount = Amount::new(dec!(500));
        assert_eq!(amount.unwrap().value(), dec!(500));
    }

    #[test]
    fn test_sign_and_size_are_not_checked_here() {
        // Range belongs to the planner, which knows the account's bounds
        for value in [Decimal::ZERO, dec!(-5), dec!(100000001)] {
            assert_eq!(Amount::new(value).unwrap().value(), value);
        }
    }

    #[test]
    fn test_amount_too_many_decimals() {
        // 0.123456789 has 9 decimal places
        let amount = Amount::new(Decimal::new(123456789, 9));
        assert!(matches!(amount, Err(AmountError::TooManyDecimals(9))));
    }

    #[test]
    fn test_amount_trailing_zeros_ok() {
        let amount = Amount::new(Decimal::new(5000000000000, 10));
        assert_eq!(amount.unwrap().value(), dec!(500));
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Result<Amount, _> = " 123.45 ".parse();
        assert_eq!(amount.unwrap().value(), dec!(123.45));

        let bad: Result<Amount, _> = "12abc".parse();
        assert!(matches!(bad, Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_amount_serde_as_string() {
        let amount: Amount = serde_json::from_str(r#""250.50""#).unwrap();
        assert_eq!(amount.value(), dec!(250.50));
        assert_eq!(serde_json::to_string(&amount).unwrap(), r#""250.50""#);
    }

    #[test]
    fn test_round_up_money() {
        assert_eq!(round_up_money(dec!(4.214285714285714)), dec!(4.21428572));
        assert_eq!(round_up_money(dec!(1.5)), dec!(1.5));
    }
}
