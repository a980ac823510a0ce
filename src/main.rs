//! GcsUpload - upload provider service for Google Cloud Storage
//!
//! Runs the provider behind a small HTTP API so a content-management host
//! can upload, delete and sign files without embedding a storage client.

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gcsupload::config::Config;
use gcsupload::server::Server;
use gcsupload::{metrics, storage, UploadProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment and optional config file
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing with JSON output for structured logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    metrics::init_metrics().context("Failed to register metrics")?;

    info!(?config, "Configuration loaded");

    // One storage client for the whole process
    let backend = storage::create_backend(&config).context("Failed to create storage backend")?;
    info!(backend = backend.name(), bucket = %config.storage.bucket_name, "Storage backend initialized");

    let provider = Arc::new(UploadProvider::new(config.storage.clone(), backend));
    let server = Server::new(config.server.clone(), provider);

    // Handle graceful shutdown
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    info!("Server starting on {}", config.server.bind_address);
    if let Err(e) = server.start(shutdown_signal).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
