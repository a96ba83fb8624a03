mod api;
mod blob_store;
mod catalog;
mod config;
mod rotation;
mod short_id;
mod table_store;

use anyhow::{Context, Result};
use api::AppState;
use blob_store::{ImageStore, S3BlobBackend};
use catalog::CatalogStore;
use config::Config;
use rotation::RotationScheduler;
use std::sync::Arc;
use table_store::PgTableBackend;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Catalog Service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Initialize components; clients are owned here and injected, never
    // shared through statics.
    let table_backend = Arc::new(
        PgTableBackend::connect(&config.database)
            .await
            .context("Failed to initialize table backend")?,
    );

    if config.database.run_migrations {
        table_backend
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    let blob_backend = Arc::new(S3BlobBackend::connect(&config.blob).await);

    let store = Arc::new(CatalogStore::new(table_backend.clone()));
    let rotation = Arc::new(RotationScheduler::new(store.clone()));
    let images = Arc::new(ImageStore::new(blob_backend));

    let state = AppState {
        store,
        rotation,
        images,
        table_backend,
        admin_token: config.api.admin_token.clone(),
    };

    // Spawn API server task
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_api_server(state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Catalog service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down catalog service");

    api_handle.abort();

    info!("Catalog service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
