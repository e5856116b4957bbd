//! # ox-server
//!
//! Axum server for the OIDC sandbox, combining:
//! - Relying-party orchestration endpoints under `/oauth`
//! - Per-kind record adapters for the embedded OIDC engine
//! - Health check endpoints
//!
//! The storage backend is selected at startup: Redis when `REDIS_URI`
//! is configured, process memory otherwise.
//!
//! ## Usage
//!
//! ```ignore
//! use ox_server::{AppConfig, Server};
//!
//! let config = AppConfig::from_env()?;
//! let server = Server::new(config).await?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod config;
pub mod router;
pub mod state;

pub use config::AppConfig;
pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use ox_store::{MemoryStore, RecordBackend, Storage};
use ox_store_redis::{RedisConfig, RedisStore};

/// The OIDC sandbox server.
pub struct Server {
    config: AppConfig,
    storage: Arc<dyn Storage>,
    backend: Arc<dyn RecordBackend>,
}

impl Server {
    /// Creates a new server instance, connecting to the configured
    /// storage backend.
    ///
    /// ## Errors
    ///
    /// Returns an error when the Redis connection cannot be
    /// established.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let (storage, backend): (Arc<dyn Storage>, Arc<dyn RecordBackend>) =
            match &config.redis_uri {
                Some(uri) => {
                    let store = Arc::new(RedisStore::new(RedisConfig::from_url(uri)).await?);
                    tracing::info!("connected to Redis storage backend");
                    (store.clone(), store)
                }
                None => {
                    let store = Arc::new(MemoryStore::new());
                    tracing::info!("using in-memory storage backend");
                    (store.clone(), store)
                }
            };

        Ok(Self {
            config,
            storage,
            backend,
        })
    }

    /// Runs the server.
    ///
    /// Starts the HTTP server and blocks until a shutdown signal is
    /// received.
    ///
    /// ## Errors
    ///
    /// Returns an error when the listen address cannot be bound.
    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.build_router();

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("server listening on http://{addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Creates the application router without starting the server.
    /// Useful for integration testing.
    #[must_use]
    pub fn build_router(&self) -> Router {
        let state = AppState::new(
            self.config.clone(),
            self.storage.clone(),
            self.backend.clone(),
        );
        create_router(state)
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
