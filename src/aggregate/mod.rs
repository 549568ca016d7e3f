//! Aggregate module
//!
//! Aggregate Root pattern: state changes only by applying events.

pub mod mortgage;

pub use mortgage::{FlexState, MortgageAccount, MortgageTerms};

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized {
    /// The type of events this aggregate handles
    type Event;

    /// Get the aggregate ID
    fn id(&self) -> uuid::Uuid;

    /// Get the current version (number of committed transitions)
    fn version(&self) -> i64;

    /// Apply an event to update the aggregate state
    fn apply(self, event: Self::Event) -> Self;
}
