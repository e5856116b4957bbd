//! # OIDC Sandbox Server
//!
//! Main entry point for the OIDC sandbox server.

#![forbid(unsafe_code)]
#![deny(warnings)]

use ox_server::{AppConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let server = Server::new(config).await?;
    server.run().await
}
