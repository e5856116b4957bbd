//! Application state.

use std::sync::Arc;

use ox_adapter::AdapterFactory;
use ox_rp::exchange::TokenClient;
use ox_rp::{ClientRegistry, DiscoveryCache, HttpDiscoverer, RpState};
use ox_store::{RecordBackend, Storage};

use crate::config::AppConfig;

/// Shared application state.
///
/// Both storage handles point at the same backend instance; the split
/// exists because the relying party only needs plain get/set while the
/// record adapters need the richer batch primitives.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: AppConfig,
    /// Per-kind record adapters handed to the embedded OIDC engine.
    pub adapters: AdapterFactory,
    rp: RpState,
}

impl AppState {
    /// Creates the application state over a storage backend.
    #[must_use]
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        backend: Arc<dyn RecordBackend>,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::new(
            storage,
            config.clients.clone(),
            &config.public_url,
        ));
        // One process-wide discovery cache shared across requests.
        let rp = RpState {
            registry,
            discovery: Arc::new(DiscoveryCache::new(Arc::new(HttpDiscoverer::new()))),
            tokens: Arc::new(TokenClient::new()),
            public_url: config.public_url.clone(),
        };
        Self {
            adapters: AdapterFactory::new(backend),
            rp,
            config,
        }
    }

    /// State for the relying-party routes.
    #[must_use]
    pub fn rp_state(&self) -> RpState {
        self.rp.clone()
    }
}
