//! Service module
//!
//! Command and query handling for mortgage accounts.

pub mod mortgage_service;
pub mod results;

pub use mortgage_service::{MortgageAccountService, ServiceConfig, MAX_SCHEDULE_MONTHS};
pub use results::{AccountSnapshot, FlexLimits, LoanSummary, ResetFailure, ResetOutcome};
