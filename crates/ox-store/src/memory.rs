//! In-memory store.
//!
//! A single mutex-guarded map holding typed entries with absolute expiry
//! instants. There is no background sweeper: every read first prunes all
//! expired entries (a full scan, acceptable at sandbox scale; a
//! production variant would use a min-heap or per-key lazy checks).
//! Batch atomicity falls out of holding the lock for the whole batch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::Value;

use ox_core::{Clock, SystemClock};

use crate::backend::{RecordBackend, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::storage::Storage;

#[derive(Debug, Clone)]
enum EntryValue {
    Blob(String),
    Hash(HashMap<String, String>),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: EntryValue,
    expires_at: Option<SystemTime>,
}

/// Volatile in-memory implementation of [`Storage`] and [`RecordBackend`].
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Creates a store driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store driven by the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Locks the map and removes every expired entry.
    fn pruned(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.retain(|_, entry| entry.expires_at.map_or(true, |at| now < at));
        entries
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<SystemTime> {
        ttl.map(|d| self.clock.now() + d)
    }

    fn apply_op(&self, entries: &mut HashMap<String, Entry>, op: WriteOp) {
        match op {
            WriteOp::PutBlob { key, value, ttl } => {
                entries.insert(
                    key,
                    Entry {
                        value: EntryValue::Blob(value),
                        expires_at: self.expiry(ttl),
                    },
                );
            }
            WriteOp::PutHash { key, fields, ttl } => {
                let expires_at = self.expiry(ttl);
                match entries.get_mut(&key) {
                    Some(Entry {
                        value: EntryValue::Hash(existing),
                        expires_at: at,
                    }) => {
                        existing.extend(fields);
                        *at = expires_at;
                    }
                    _ => {
                        entries.insert(
                            key,
                            Entry {
                                value: EntryValue::Hash(fields.into_iter().collect()),
                                expires_at,
                            },
                        );
                    }
                }
            }
            WriteOp::ListPush {
                key,
                value,
                min_ttl,
            } => {
                let floor = self.expiry(min_ttl);
                match entries.get_mut(&key) {
                    Some(Entry {
                        value: EntryValue::List(items),
                        expires_at,
                    }) => {
                        items.push(value);
                        // Raise the TTL to the floor, never lower it. A
                        // list without an expiry stays without one.
                        if let (Some(current), Some(floor)) = (*expires_at, floor) {
                            if current < floor {
                                *expires_at = Some(floor);
                            }
                        }
                    }
                    _ => {
                        entries.insert(
                            key,
                            Entry {
                                value: EntryValue::List(vec![value]),
                                expires_at: floor,
                            },
                        );
                    }
                }
            }
            WriteOp::Delete { key } => {
                entries.remove(&key);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn set_item(&self, key: &str, value: &Value, ttl: Option<Duration>) -> StoreResult<()> {
        let serialized =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value: EntryValue::Blob(serialized),
                expires_at: self.expiry(ttl),
            },
        );
        Ok(())
    }

    async fn get_item(&self, key: &str) -> StoreResult<Option<Value>> {
        let entries = self.pruned();
        match entries.get(key) {
            Some(Entry {
                value: EntryValue::Blob(data),
                ..
            }) => {
                let parsed = serde_json::from_str(data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(parsed))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl RecordBackend for MemoryStore {
    async fn apply(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let mut entries = self.pruned();
        for op in ops {
            self.apply_op(&mut entries, op);
        }
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.pruned();
        match entries.get(key) {
            Some(Entry {
                value: EntryValue::Blob(data),
                ..
            }) => Ok(Some(data.clone())),
            _ => Ok(None),
        }
    }

    async fn get_hash(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let entries = self.pruned();
        match entries.get(key) {
            Some(Entry {
                value: EntryValue::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            _ => Ok(HashMap::new()),
        }
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let entries = self.pruned();
        match entries.get(key) {
            Some(Entry {
                value: EntryValue::List(items),
                ..
            }) => Ok(items.clone()),
            _ => Ok(Vec::new()),
        }
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = self.clock.now();
        let entries = self.pruned();
        Ok(entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .and_then(|at| at.duration_since(now).ok()))
    }

    async fn set_hash_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.pruned();
        if let Some(Entry {
            value: EntryValue::Hash(fields),
            ..
        }) = entries.get_mut(key)
        {
            fields.insert(field.to_string(), value.to_string());
        }
        Ok(())
    }
}
