//! Flex Mortgage - mortgage flex-payment backend API
//!
//! Serves account snapshots, flex planning and application, payment
//! schedules and stress forecasts over HTTP.

use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;

use flex_mortgage::jobs::{JobScheduler, JobSchedulerConfig};
use flex_mortgage::repository::{load_seed_file, AccountRepository, ForecastSource};
use flex_mortgage::service::ServiceConfig;
use flex_mortgage::{build_router, db, init_tracing, Config, MortgageAccountService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting flex mortgage server");

    let (repository, forecasts, pool) = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;

            db::verify_connection(&pool).await?;
            if !db::check_schema(&pool).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }

            (
                AccountRepository::postgres(pool.clone()),
                ForecastSource::Postgres(pool.clone()),
                Some(pool),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory account store");
            (AccountRepository::in_memory(), ForecastSource::Unavailable, None)
        }
    };

    // A forecast file overrides the database source
    let forecasts = match &config.forecasts_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading income/expense forecasts");
            ForecastSource::from_file(path).await?
        }
        None => forecasts,
    };

    let service =
        MortgageAccountService::with_config(repository, forecasts, ServiceConfig::from(&config));

    if let Some(path) = &config.seed_accounts_path {
        seed_accounts(&service, path).await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = JobScheduler::with_config(
        service.clone(),
        JobSchedulerConfig {
            flex_reset_check_interval: config.flex_reset_check_interval,
        },
    )
    .start(shutdown_rx);

    tracing::info!(
        backend = service.repository().backend(),
        "Listening on http://{}",
        addr
    );

    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    shutdown_tx.send(true).ok();
    scheduler.await?;

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed.");
    }
    tracing::info!("Goodbye!");

    Ok(())
}

/// Open every account in the seed file that is not stored yet
async fn seed_accounts(service: &MortgageAccountService, path: &str) -> anyhow::Result<()> {
    let terms = load_seed_file(path).await?;
    let total = terms.len();
    let mut opened = 0;

    for terms in terms {
        let account_id = terms.id;
        match service.open_account(terms).await {
            Ok(_) => opened += 1,
            Err(flex_mortgage::AppError::AccountExists(_)) => {
                tracing::debug!(account_id = %account_id, "Seed account already stored");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(path = %path, total, opened, "Seeded mortgage accounts");
    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
