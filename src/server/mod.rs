//! HTTP server implementation
//!
//! Wraps the provider routes in tracing, timeout and compression middleware
//! and serves them until the shutdown future resolves.

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::errors::Result;
use crate::provider::UploadProvider;
use crate::routes;

/// Provider routes with the middleware stack described by `config`
///
/// `max_body_size` bounds buffered uploads only; streamed uploads are bounded
/// by the provider's size limit while they are received.
pub fn build_router(provider: Arc<UploadProvider>, config: &ServerConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeout_secs)))
        .layer(CompressionLayer::new());

    routes::create_router(provider, config.max_body_size).layer(middleware)
}

/// HTTP server for GcsUpload
pub struct Server {
    config: ServerConfig,
    provider: Arc<UploadProvider>,
}

impl Server {
    pub fn new(config: ServerConfig, provider: Arc<UploadProvider>) -> Self {
        Self { config, provider }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.provider.clone(), &self.config);

        let listener = tokio::net::TcpListener::bind(self.config.bind_address).await?;
        info!(
            address = %self.config.bind_address,
            timeout_secs = self.config.timeout_secs,
            max_body_size = self.config.max_body_size,
            "Server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
