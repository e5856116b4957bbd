//! Record-storage backend contract.
//!
//! The per-kind record adapter needs more than plain get/set: hash
//! records that can be mutated per-field, an append-only list per grant,
//! and multi-key writes that readers observe as a single unit. This
//! trait captures exactly those primitives so the adapter logic stays
//! backend-agnostic.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// One write in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Store an opaque serialized value under `key`.
    PutBlob {
        /// Target key.
        key: String,
        /// Serialized record.
        value: String,
        /// Expiry; `None` stores without TTL.
        ttl: Option<Duration>,
    },
    /// Merge fields into the hash at `key`, creating it if absent, and
    /// reset its TTL. Fields not named are left untouched.
    PutHash {
        /// Target key.
        key: String,
        /// Field/value pairs to write.
        fields: Vec<(String, String)>,
        /// Expiry; `None` stores without TTL.
        ttl: Option<Duration>,
    },
    /// Append `value` to the list at `key`, creating it if absent.
    ///
    /// When `min_ttl` is set, the list's TTL is raised to at least that
    /// value. It is never shortened: a list with a longer remaining TTL,
    /// or no TTL at all, is left untouched.
    ListPush {
        /// Target key.
        key: String,
        /// Element to append.
        value: String,
        /// Lower bound for the list's TTL, if any.
        min_ttl: Option<Duration>,
    },
    /// Delete `key`. Deleting an absent key is not an error.
    Delete {
        /// Target key.
        key: String,
    },
}

/// Storage backend for protocol records.
///
/// Implementations must be thread-safe and make `apply` atomic: a
/// concurrent reader sees either none or all of the batch's writes.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Executes all writes as one atomic batch.
    async fn apply(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    /// Returns the blob stored at `key`, if present and unexpired.
    async fn get_blob(&self, key: &str) -> StoreResult<Option<String>>;

    /// Returns all fields of the hash at `key`.
    ///
    /// An absent or expired key yields an empty map.
    async fn get_hash(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Returns all elements of the list at `key`, oldest first.
    ///
    /// An absent or expired key yields an empty list.
    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Returns the remaining TTL for `key`.
    ///
    /// Returns `None` if the key doesn't exist or has no TTL.
    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Sets one field on the hash at `key`, without touching its TTL.
    ///
    /// A no-op when the key no longer exists, so callers racing with
    /// expiry never observe an error.
    async fn set_hash_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;
}
