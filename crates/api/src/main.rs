use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use atelier_api::app::{create_app, AppState, Stores};
use atelier_api::config::Config;
use atelier_api::jobs::{EventReminderJob, JobScheduler, PoolMetricsJob, PublishEventsJob};
use atelier_api::middleware::{init_metrics, logging::init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging);
    init_metrics().context("Failed to install Prometheus recorder")?;

    info!("Starting Atelier API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&(&config.database).into()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let addr = config.socket_addr()?;
    let jobs_config = config.jobs.clone();
    let state = AppState::new(config, Stores::postgres(pool.clone()))?;

    let mut scheduler = JobScheduler::new();
    if jobs_config.enabled {
        scheduler.register(PublishEventsJob::new(
            state.events.clone(),
            jobs_config.publish_interval_minutes,
        ));
        if jobs_config.reminder_enabled {
            scheduler.register(EventReminderJob::new(
                state.events.clone(),
                state.attendance.clone(),
                jobs_config.reminder_hour_utc,
            ));
        }
        scheduler.register(PoolMetricsJob::new(pool));
        scheduler.start();
    }

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
