//! Provider discovery with a bounded memoization cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ox_core::{Clock, Error, Result, SystemClock};

/// Number of issuers memoized at once.
const CACHE_CAPACITY: usize = 10;

/// Freshness window for a memoized discovery document.
const CACHE_MAX_AGE: Duration = Duration::from_millis(5000);

/// The subset of an issuer's discovery document the relying party needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier.
    pub issuer: String,
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Userinfo endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    /// RP-initiated logout endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

/// Fetches an issuer's discovery document.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Resolves the discovery document for `issuer`.
    async fn discover(&self, issuer: &str) -> Result<ProviderMetadata>;
}

/// HTTP discoverer hitting the standard well-known location.
pub struct HttpDiscoverer {
    http: reqwest::Client,
}

impl HttpDiscoverer {
    /// Creates a discoverer with its own HTTP client. Redirects are
    /// followed; providers hosted under a sub-path may redirect during
    /// discovery.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discoverer for HttpDiscoverer {
    async fn discover(&self, issuer: &str) -> Result<ProviderMetadata> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("discovery request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "discovery for {issuer} returned {}",
                response.status()
            )));
        }
        response
            .json::<ProviderMetadata>()
            .await
            .map_err(|e| Error::Upstream(format!("malformed discovery document: {e}")))
    }
}

/// Process-wide memoized discovery.
///
/// Capacity- and time-bounded; there is no explicit invalidation API,
/// entries simply age out and are recomputed. The clock and the inner
/// discoverer are injected so tests can stub both.
pub struct DiscoveryCache {
    discoverer: Arc<dyn Discoverer>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, (SystemTime, ProviderMetadata)>>,
}

impl DiscoveryCache {
    /// Creates a cache over the given discoverer, driven by the system
    /// clock.
    #[must_use]
    pub fn new(discoverer: Arc<dyn Discoverer>) -> Self {
        Self::with_clock(discoverer, Arc::new(SystemClock))
    }

    /// Creates a cache with an injected clock.
    #[must_use]
    pub fn with_clock(discoverer: Arc<dyn Discoverer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            discoverer,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the discovery document for `issuer`, memoized.
    ///
    /// ## Errors
    ///
    /// Discovery failures propagate as upstream errors; failed lookups
    /// are not cached.
    pub async fn discover(&self, issuer: &str) -> Result<ProviderMetadata> {
        let now = self.clock.now();
        {
            let entries = self.entries.lock().expect("discovery cache lock poisoned");
            if let Some((fetched_at, metadata)) = entries.get(issuer) {
                let fresh = now
                    .duration_since(*fetched_at)
                    .map(|age| age < CACHE_MAX_AGE)
                    .unwrap_or(true);
                if fresh {
                    return Ok(metadata.clone());
                }
            }
        }

        debug!(issuer, "fetching discovery document");
        let metadata = self.discoverer.discover(issuer).await?;

        let mut entries = self.entries.lock().expect("discovery cache lock poisoned");
        if entries.len() >= CACHE_CAPACITY && !entries.contains_key(issuer) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (fetched_at, _))| *fetched_at)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                entries.remove(&key);
            }
        }
        entries.insert(issuer.to_string(), (now, metadata.clone()));
        Ok(metadata)
    }
}
