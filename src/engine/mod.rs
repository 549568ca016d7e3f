//! Calculation engine
//!
//! Pure, stateless calculators. They read immutable account snapshots and
//! never touch the repository, so any number of callers may run them
//! concurrently.

pub mod amortization;
pub mod flex;
pub mod stress;

pub use amortization::{schedule, AmortizationRow, AmortizationSchedule, ScheduleTotals};
pub use flex::{calculate, max_reduction, MAX_REDUCTION_CAP, MIN_REDUCTION};
pub use stress::{
    predict, IncomeExpenseMonth, MonthlyForecast, StressForecast, StressLevel,
    DEFAULT_HORIZON_MONTHS,
};
