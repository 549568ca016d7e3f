//! Mortgage Account Aggregate
//!
//! MortgageAccount is the only mutable record in the system. Commands
//! validate against the current snapshot and return an event; the event is
//! applied to produce the next snapshot once the repository has accepted it.

use std::borrow::Cow;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DistributionPlan, DomainError, FlexEvent, MortgageEvent};
use crate::engine::flex;

use super::Aggregate;

/// Allowed choices for the yearly flex cap
pub const MAX_FLEX_USAGE_CHOICES: [u32; 4] = [3, 4, 5, 6];

fn default_max_flex_usage() -> u32 {
    3
}

/// Where an account sits in the flex state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexState {
    FlexOff,
    FlexOnAvailable,
    FlexOnExhausted,
}

/// Loan terms and flex settings an account is opened or restored with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgageTerms {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub mortgage_number: String,
    pub original_principal: Decimal,
    pub current_balance: Decimal,
    pub monthly_payment: Decimal,
    pub annual_interest_rate: Decimal,
    pub origination_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub remaining_months: u32,
    #[serde(default)]
    pub flex_enabled: bool,
    #[serde(default = "default_max_flex_usage")]
    pub max_flex_usage_per_year: u32,
    #[serde(default)]
    pub flex_usage_count: u32,
    /// Calendar year the usage counter belongs to
    pub flex_usage_year: i32,
}

/// Mortgage Account Aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MortgageAccount {
    id: Uuid,
    owner_id: Uuid,
    mortgage_number: String,
    original_principal: Decimal,
    current_balance: Decimal,
    monthly_payment: Decimal,
    annual_interest_rate: Decimal,
    origination_date: NaiveDate,
    maturity_date: NaiveDate,
    remaining_months: u32,
    flex_enabled: bool,
    max_flex_usage_per_year: u32,
    flex_usage_count: u32,
    flex_usage_year: i32,
    flex_history: Vec<FlexEvent>,
    version: i64,
}

impl MortgageAccount {
    /// Open an account at origination. The first committed version is 1.
    pub fn open(terms: MortgageTerms) -> Result<Self, DomainError> {
        Self::restore(terms, Vec::new(), 1)
    }

    /// Rebuild an account from stored state, re-checking every invariant
    pub fn restore(
        terms: MortgageTerms,
        flex_history: Vec<FlexEvent>,
        version: i64,
    ) -> Result<Self, DomainError> {
        validate_terms(&terms)?;
        if version < 1 {
            return Err(DomainError::InvalidAccount(format!(
                "version must be at least 1 (got {})",
                version
            )));
        }

        Ok(Self {
            id: terms.id,
            owner_id: terms.owner_id,
            mortgage_number: terms.mortgage_number,
            original_principal: terms.original_principal,
            current_balance: terms.current_balance,
            monthly_payment: terms.monthly_payment,
            annual_interest_rate: terms.annual_interest_rate,
            origination_date: terms.origination_date,
            maturity_date: terms.maturity_date,
            remaining_months: terms.remaining_months,
            flex_enabled: terms.flex_enabled,
            max_flex_usage_per_year: terms.max_flex_usage_per_year,
            flex_usage_count: terms.flex_usage_count,
            flex_usage_year: terms.flex_usage_year,
            flex_history,
            version,
        })
    }

    /// Current terms, without history or version
    pub fn terms(&self) -> MortgageTerms {
        MortgageTerms {
            id: self.id,
            owner_id: self.owner_id,
            mortgage_number: self.mortgage_number.clone(),
            original_principal: self.original_principal,
            current_balance: self.current_balance,
            monthly_payment: self.monthly_payment,
            annual_interest_rate: self.annual_interest_rate,
            origination_date: self.origination_date,
            maturity_date: self.maturity_date,
            remaining_months: self.remaining_months,
            flex_enabled: self.flex_enabled,
            max_flex_usage_per_year: self.max_flex_usage_per_year,
            flex_usage_count: self.flex_usage_count,
            flex_usage_year: self.flex_usage_year,
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Compute the distribution plan for a reduction at `now` without
    /// committing it. A usage counter left over from an earlier year counts
    /// as zero.
    pub fn plan_flex(
        &self,
        reduction_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DistributionPlan, DomainError> {
        flex::calculate(&self.in_usage_year(now.year()), reduction_amount)
    }

    /// Validate a reduction and return the event that records it
    pub fn apply_flex(
        &self,
        reduction_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<MortgageEvent, DomainError> {
        let plan = self.plan_flex(reduction_amount, now)?;

        Ok(MortgageEvent::FlexApplied {
            account_id: self.id,
            usage_year: now.year().max(self.flex_usage_year),
            flex_event: FlexEvent::new(now, self.monthly_payment, plan),
        })
    }

    /// Switch flex on or off
    pub fn toggle_flex(&self, now: DateTime<Utc>) -> MortgageEvent {
        MortgageEvent::FlexToggled {
            account_id: self.id,
            enabled: !self.flex_enabled,
            toggled_at: now,
        }
    }

    /// Change the yearly flex cap
    pub fn set_max_flex_usage(
        &self,
        value: u32,
        now: DateTime<Utc>,
    ) -> Result<MortgageEvent, DomainError> {
        if !MAX_FLEX_USAGE_CHOICES.contains(&value) {
            return Err(DomainError::InvalidMaxFlexUsage { value });
        }
        if value < self.flex_usage_count {
            return Err(DomainError::MaxFlexUsageBelowUsage {
                value,
                used: self.flex_usage_count,
            });
        }

        Ok(MortgageEvent::MaxFlexUsageChanged {
            account_id: self.id,
            max_flex_usage_per_year: value,
            changed_at: now,
        })
    }

    /// Reset the usage counter if `now` falls in a later calendar year.
    ///
    /// Returns `None` when the counter already belongs to the current year.
    pub fn reset_flex_usage(&self, now: DateTime<Utc>) -> Option<MortgageEvent> {
        let year = now.year();
        if year <= self.flex_usage_year {
            return None;
        }

        Some(MortgageEvent::FlexUsageReset {
            account_id: self.id,
            year,
            previous_count: self.flex_usage_count,
            reset_at: now,
        })
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    pub fn flex_state(&self) -> FlexState {
        if !self.flex_enabled {
            FlexState::FlexOff
        } else if self.has_flex_uses_left() {
            FlexState::FlexOnAvailable
        } else {
            FlexState::FlexOnExhausted
        }
    }

    /// The account as seen from `year`: a counter from an earlier year
    /// starts over at zero.
    fn in_usage_year(&self, year: i32) -> Cow<'_, Self> {
        if year <= self.flex_usage_year {
            return Cow::Borrowed(self);
        }

        let mut current = self.clone();
        current.flex_usage_count = 0;
        current.flex_usage_year = year;
        Cow::Owned(current)
    }

    pub fn has_flex_uses_left(&self) -> bool {
        self.flex_usage_count < self.max_flex_usage_per_year
    }

    pub fn remaining_flex_uses(&self) -> u32 {
        self.max_flex_usage_per_year.saturating_sub(self.flex_usage_count)
    }

    /// Whole months between origination and maturity
    pub fn original_term_months(&self) -> u32 {
        months_between(self.origination_date, self.maturity_date)
    }

    /// Months already paid, floored at zero
    pub fn elapsed_months(&self) -> u32 {
        self.original_term_months()
            .saturating_sub(self.remaining_months)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn mortgage_number(&self) -> &str {
        &self.mortgage_number
    }

    pub fn original_principal(&self) -> Decimal {
        self.original_principal
    }

    pub fn current_balance(&self) -> Decimal {
        self.current_balance
    }

    pub fn monthly_payment(&self) -> Decimal {
        self.monthly_payment
    }

    pub fn annual_interest_rate(&self) -> Decimal {
        self.annual_interest_rate
    }

    pub fn origination_date(&self) -> NaiveDate {
        self.origination_date
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.maturity_date
    }

    pub fn remaining_months(&self) -> u32 {
        self.remaining_months
    }

    pub fn flex_enabled(&self) -> bool {
        self.flex_enabled
    }

    pub fn max_flex_usage_per_year(&self) -> u32 {
        self.max_flex_usage_per_year
    }

    pub fn flex_usage_count(&self) -> u32 {
        self.flex_usage_count
    }

    pub fn flex_usage_year(&self) -> i32 {
        self.flex_usage_year
    }

    pub fn flex_history(&self) -> &[FlexEvent] {
        &self.flex_history
    }
}

fn validate_terms(terms: &MortgageTerms) -> Result<(), DomainError> {
    let invalid = |msg: String| Err(DomainError::InvalidAccount(msg));

    if terms.original_principal <= Decimal::ZERO {
        return invalid(format!(
            "original principal must be positive (got {})",
            terms.original_principal
        ));
    }
    if terms.current_balance < Decimal::ZERO || terms.current_balance > terms.original_principal {
        return invalid(format!(
            "current balance {} must be between 0 and original principal {}",
            terms.current_balance, terms.original_principal
        ));
    }
    if terms.monthly_payment <= Decimal::ZERO {
        return invalid(format!(
            "monthly payment must be positive (got {})",
            terms.monthly_payment
        ));
    }
    if terms.annual_interest_rate < Decimal::ZERO || terms.annual_interest_rate >= Decimal::ONE {
        return invalid(format!(
            "annual interest rate must be in [0, 1) (got {})",
            terms.annual_interest_rate
        ));
    }
    if terms.origination_date >= terms.maturity_date {
        return invalid(format!(
            "origination date {} must precede maturity date {}",
            terms.origination_date, terms.maturity_date
        ));
    }
    if terms.flex_usage_count > terms.max_flex_usage_per_year {
        return invalid(format!(
            "flex usage count {} exceeds yearly maximum {}",
            terms.flex_usage_count, terms.max_flex_usage_per_year
        ));
    }

    Ok(())
}

/// Whole calendar months from `start` to `end`, zero if `end` is not later
pub(crate) fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

impl Aggregate for MortgageAccount {
    type Event = MortgageEvent;

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            MortgageEvent::FlexApplied {
                flex_event,
                usage_year,
                ..
            } => {
                if usage_year > self.flex_usage_year {
                    self.flex_usage_year = usage_year;
                    self.flex_usage_count = 0;
                }
                // The deferral shifts timing only; principal is not forgiven
                self.flex_history.push(flex_event);
                self.flex_usage_count += 1;
            }

            MortgageEvent::FlexToggled { enabled, .. } => {
                self.flex_enabled = enabled;
            }

            MortgageEvent::MaxFlexUsageChanged {
                max_flex_usage_per_year,
                ..
            } => {
                self.max_flex_usage_per_year = max_flex_usage_per_year;
            }

            MortgageEvent::FlexUsageReset { year, .. } => {
                self.flex_usage_count = 0;
                self.flex_usage_year = year;
            }
        }

        self.version += 1;
        self
    }
}
