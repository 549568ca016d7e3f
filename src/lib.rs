//! Flex Mortgage Library
//!
//! Amortization, flex redistribution and stress forecasting for mortgage
//! accounts, plus the HTTP service around them. Re-exports modules for
//! integration testing and the server binary.

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod repository;
pub mod service;

pub use config::{Config, LogFormat};
pub use domain::{Amount, AmountError, DomainError, OperationContext};
pub use domain::{MortgageEvent, RecordedEvent};
pub use error::{AppError, AppResult};
pub use service::MortgageAccountService;

/// Initialize tracing/logging
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flex_mortgage=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Build the application router
pub fn build_router(service: MortgageAccountService) -> Router {
    // Axum layers run in reverse order: context -> logging -> handler
    let api_router = api::create_router()
        .layer(middleware::from_fn(api::middleware::logging_middleware))
        .layer(middleware::from_fn(api::middleware::context_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
