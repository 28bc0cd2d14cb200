//! Snapshot HTTP server
//!
//! Binds the listener, preloads cameras and serves the router until the
//! shutdown future resolves. All streams are stopped before returning.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::http::config::ServerConfig;
use crate::http::routes;
use crate::registry::{RegistryConfig, StreamRegistry};

/// Snapshot server
pub struct HttpServer {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
}

impl HttpServer {
    /// Create a new server with the given configurations
    pub fn new(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        Self::with_registry(config, Arc::new(StreamRegistry::new(registry_config)))
    }

    /// Create a new server around an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<StreamRegistry>) -> Self {
        Self { config, registry }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Router serving this server's registry
    pub fn router(&self) -> Router {
        routes::router(Arc::clone(&self.registry))
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;

        if !self.config.preload.is_empty() {
            let started = self.registry.preload(&self.config.preload).await;
            tracing::info!(
                requested = self.config.preload.len(),
                started,
                "Preload complete"
            );
        }

        let cleanup_handle = self
            .config
            .cleanup_enabled
            .then(|| self.registry.spawn_cleanup_task());

        tracing::info!(addr = %addr, "Snapshot server listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        // Stop cleanup task on shutdown
        if let Some(handle) = cleanup_handle {
            handle.abort();
        }

        if tokio::time::timeout(self.config.shutdown_timeout, self.registry.stop_all())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "Timed out stopping streams"
            );
        }

        result?;
        Ok(())
    }
}
