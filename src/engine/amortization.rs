//! Amortization schedule projection
//!
//! Lazily projects monthly interest, principal and balance rows for a fixed
//! payment. The schedule holds only its inputs, so iterating it twice yields
//! the same rows.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::iter::FusedIterator;

use crate::aggregate::MortgageAccount;

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// One projected month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmortizationRow {
    /// Payment number, starting at 1
    pub month: u32,
    pub opening_balance: Decimal,
    pub payment: Decimal,
    pub interest_payment: Decimal,
    /// Negative when the payment does not cover the interest
    pub principal_payment: Decimal,
    pub closing_balance: Decimal,
    pub negative_amortization: bool,
}

/// Totals over a full schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleTotals {
    pub months: u32,
    pub total_paid: Decimal,
    pub total_interest: Decimal,
    pub total_principal: Decimal,
    pub closing_balance: Decimal,
    pub negative_amortization_months: u32,
}

/// Inputs of a projection. Cheap to copy, restartable via [`iter`](Self::iter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmortizationSchedule {
    balance: Decimal,
    annual_rate: Decimal,
    monthly_payment: Decimal,
    horizon_months: u32,
}

impl AmortizationSchedule {
    pub fn new(
        balance: Decimal,
        annual_rate: Decimal,
        monthly_payment: Decimal,
        horizon_months: u32,
    ) -> Self {
        Self {
            balance,
            annual_rate,
            monthly_payment,
            horizon_months,
        }
    }

    /// Project forward from the account's current balance
    pub fn for_account(account: &MortgageAccount, horizon_months: u32) -> Self {
        Self::new(
            account.current_balance(),
            account.annual_interest_rate(),
            account.monthly_payment(),
            horizon_months,
        )
    }

    pub fn monthly_rate(&self) -> Decimal {
        monthly_rate(self.annual_rate)
    }

    pub fn iter(&self) -> ScheduleIter {
        ScheduleIter {
            balance: self.balance,
            monthly_rate: self.monthly_rate(),
            monthly_payment: self.monthly_payment,
            month: 0,
            horizon_months: self.horizon_months,
        }
    }

    /// Run the whole schedule and fold it into totals
    pub fn totals(&self) -> ScheduleTotals {
        let mut totals = ScheduleTotals {
            months: 0,
            total_paid: Decimal::ZERO,
            total_interest: Decimal::ZERO,
            total_principal: Decimal::ZERO,
            closing_balance: self.balance,
            negative_amortization_months: 0,
        };

        for row in self.iter() {
            totals.months += 1;
            totals.total_paid += row.payment;
            totals.total_interest += row.interest_payment;
            totals.total_principal += row.principal_payment;
            totals.closing_balance = row.closing_balance;
            if row.negative_amortization {
                totals.negative_amortization_months += 1;
            }
        }

        totals
    }
}

impl<'a> IntoIterator for &'a AmortizationSchedule {
    type Item = AmortizationRow;
    type IntoIter = ScheduleIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the rows of an [`AmortizationSchedule`].
#[derive(Debug, Clone)]
pub struct ScheduleIter {
    balance: Decimal,
    monthly_rate: Decimal,
    monthly_payment: Decimal,
    month: u32,
    horizon_months: u32,
}

impl Iterator for ScheduleIter {
    type Item = AmortizationRow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.month >= self.horizon_months {
            return None;
        }
        self.month += 1;

        let opening_balance = self.balance;
        let interest_payment = opening_balance
            .checked_mul(self.monthly_rate)
            .unwrap_or(Decimal::MAX);
        let principal_payment = self.monthly_payment - interest_payment;
        let closing_balance = opening_balance
            .checked_sub(principal_payment)
            .unwrap_or(Decimal::MAX)
            .max(Decimal::ZERO);

        self.balance = closing_balance;

        Some(AmortizationRow {
            month: self.month,
            opening_balance,
            payment: self.monthly_payment,
            interest_payment,
            principal_payment,
            closing_balance,
            negative_amortization: principal_payment < Decimal::ZERO,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.horizon_months - self.month) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ScheduleIter {}

impl FusedIterator for ScheduleIter {}

/// Monthly rate for a nominal annual rate
pub fn monthly_rate(annual_rate: Decimal) -> Decimal {
    annual_rate / MONTHS_PER_YEAR
}

/// Project `horizon_months` rows from the given balance
pub fn schedule(
    balance: Decimal,
    annual_rate: Decimal,
    monthly_payment: Decimal,
    horizon_months: u32,
) -> ScheduleIter {
    AmortizationSchedule::new(balance, annual_rate, monthly_payment, horizon_months).iter()
}
