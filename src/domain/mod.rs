//! Domain module
//!
//! Core domain types and business rules.

pub mod amount;
pub mod context;
pub mod error;
pub mod events;
pub mod flex;

pub use amount::{round_up_money, Amount, AmountError, MONEY_SCALE};
pub use context::OperationContext;
pub use error::DomainError;
pub use events::{MortgageEvent, RecordedEvent};
pub use flex::{DistributionPlan, FlexEvent, MonthlyAdjustment};
