//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use ox_rp::ClientMetadata;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Public base URL of this deployment, used in generated URLs and
    /// as the default client's issuer.
    pub public_url: String,

    /// Redis connection URI. When unset, records and RP metadata live
    /// in process memory.
    pub redis_uri: Option<String>,

    /// Predefined OIDC clients available without registration.
    pub clients: Vec<ClientMetadata>,

    /// Log level.
    pub log_level: String,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// ## Errors
    ///
    /// Returns an error when `OIDC_CLIENTS` is present but not a valid
    /// JSON array of client metadata.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let public_url =
            std::env::var("OIDC_PUBLIC_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));

        let redis_uri = std::env::var("REDIS_URI").ok();

        let clients = match std::env::var("OIDC_CLIENTS") {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("OIDC_CLIENTS is not a valid client list: {e}"))?,
            Err(_) => Vec::new(),
        };

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            host,
            port,
            public_url,
            redis_uri,
            clients,
            log_level,
        })
    }

    /// Creates a configuration for testing, backed by process memory.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            public_url: "http://localhost:3000".to_string(),
            redis_uri: None,
            clients: Vec::new(),
            log_level: "debug".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: "http://localhost:3000".to_string(),
            redis_uri: None,
            clients: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}
