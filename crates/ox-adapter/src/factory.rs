//! Adapter construction.

use std::sync::Arc;

use ox_core::{Clock, SystemClock};
use ox_store::RecordBackend;

use crate::adapter::RecordAdapter;
use crate::kind::RecordKind;

/// Builds one [`RecordAdapter`] per record-kind name over a shared
/// backend. The engine calls this lazily, once per kind it touches.
#[derive(Clone)]
pub struct AdapterFactory {
    backend: Arc<dyn RecordBackend>,
    clock: Arc<dyn Clock>,
}

impl AdapterFactory {
    /// Creates a factory over the given backend, driven by the system
    /// clock.
    #[must_use]
    pub fn new(backend: Arc<dyn RecordBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    /// Creates a factory with an injected clock.
    #[must_use]
    pub fn with_clock(backend: Arc<dyn RecordBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Returns the adapter for the named record kind.
    #[must_use]
    pub fn adapter(&self, name: &str) -> RecordAdapter {
        RecordAdapter::new(
            RecordKind::named(name),
            self.backend.clone(),
            self.clock.clone(),
        )
    }
}
