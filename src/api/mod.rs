//! HTTP surface
//!
//! Mortgage routes under `/api/v1` plus the request context and logging
//! middleware that wrap them.

pub mod middleware;
pub mod routes;

pub use routes::create_router;
