//! Repository module
//!
//! Account persistence with optimistic concurrency, and the source of
//! income/expense forecasts.

pub mod account;
pub mod error;
pub mod forecast;

pub use account::{load_seed_file, AccountRepository};
pub use error::RepositoryError;
pub use forecast::ForecastSource;
