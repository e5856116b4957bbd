//! The minimal key-value storage contract.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// Key-value storage with per-key TTL.
///
/// Implementations must be thread-safe. Values are JSON records; the
/// implementation owns serialization. A `ttl` of `None` stores the key
/// without an expiry.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores a record under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &Value, ttl: Option<Duration>) -> StoreResult<()>;

    /// Returns the record stored under `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get_item(&self, key: &str) -> StoreResult<Option<Value>>;
}
