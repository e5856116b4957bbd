//! Redis storage implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Value as FredValue;
use serde_json::Value as JsonValue;

use ox_store::{RecordBackend, StoreResult, Storage, WriteOp};

use crate::config::RedisConfig;
use crate::error::{from_redis_error, from_serde_error};

/// Redis-based store.
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Creates a new Redis store and establishes the connection.
    ///
    /// ## Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn new(config: RedisConfig) -> StoreResult<Self> {
        let redis_config = Config::from_url(&config.connection_url())
            .map_err(|e| ox_store::StoreError::Configuration(e.to_string()))?;

        let client = Client::new(
            redis_config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );

        client.init().await.map_err(from_redis_error)?;

        Ok(Self { client })
    }

    /// Returns the underlying Redis client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn key_ttl(&self, key: &str) -> StoreResult<i64> {
        self.client.ttl(key).await.map_err(from_redis_error)
    }
}

/// Safely convert seconds to i64 for Redis expiration.
#[allow(clippy::cast_possible_wrap)]
const fn seconds_to_i64(seconds: u64) -> i64 {
    seconds as i64
}

/// Safely convert i64 TTL to u64 for Duration.
#[allow(clippy::cast_sign_loss)]
const fn ttl_to_u64(ttl: i64) -> u64 {
    ttl as u64
}

#[async_trait]
impl Storage for RedisStore {
    async fn set_item(&self, key: &str, value: &JsonValue, ttl: Option<Duration>) -> StoreResult<()> {
        let serialized = serde_json::to_string(value).map_err(from_serde_error)?;
        let expiration = ttl.map(|d| Expiration::EX(seconds_to_i64(d.as_secs().max(1))));
        self.client
            .set::<(), _, _>(key, serialized, expiration, None, false)
            .await
            .map_err(from_redis_error)
    }

    async fn get_item(&self, key: &str) -> StoreResult<Option<JsonValue>> {
        let value: Option<String> = self.client.get(key).await.map_err(from_redis_error)?;
        match value {
            Some(v) => {
                let parsed = serde_json::from_str(&v).map_err(from_serde_error)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordBackend for RedisStore {
    async fn apply(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        // List TTLs have to be read before the transaction is queued, so
        // a concurrent push can in principle observe a stale TTL. The
        // raise-only rule keeps that race harmless: the list only ever
        // outlives the records pointing into it.
        let mut list_expirations: Vec<(String, i64)> = Vec::new();
        for op in &ops {
            if let WriteOp::ListPush {
                key,
                min_ttl: Some(min_ttl),
                ..
            } = op
            {
                let floor = seconds_to_i64(min_ttl.as_secs().max(1));
                match self.key_ttl(key).await? {
                    // Persistent keys stay persistent.
                    -1 => {}
                    ttl if ttl < floor => list_expirations.push((key.clone(), floor)),
                    _ => {}
                }
            }
        }

        let trx = self.client.multi();
        for op in ops {
            match op {
                WriteOp::PutBlob { key, value, ttl } => {
                    let expiration = ttl.map(|d| Expiration::EX(seconds_to_i64(d.as_secs().max(1))));
                    let _: () = trx
                        .set(&key, value, expiration, None, false)
                        .await
                        .map_err(from_redis_error)?;
                }
                WriteOp::PutHash { key, fields, ttl } => {
                    let fields: HashMap<String, String> = fields.into_iter().collect();
                    let _: () = trx.hset(&key, fields).await.map_err(from_redis_error)?;
                    match ttl {
                        Some(ttl) => {
                            let seconds = seconds_to_i64(ttl.as_secs().max(1));
                            let _: () = trx
                                .expire(&key, seconds, None)
                                .await
                                .map_err(from_redis_error)?;
                        }
                        // HSET keeps a prior TTL; a no-TTL write must
                        // clear it.
                        None => {
                            let _: () = trx.persist(&key).await.map_err(from_redis_error)?;
                        }
                    }
                }
                WriteOp::ListPush { key, value, .. } => {
                    let _: () = trx.rpush(&key, value).await.map_err(from_redis_error)?;
                }
                WriteOp::Delete { key } => {
                    let _: () = trx.del(&key).await.map_err(from_redis_error)?;
                }
            }
        }
        for (key, seconds) in list_expirations {
            let _: () = trx
                .expire(&key, seconds, None)
                .await
                .map_err(from_redis_error)?;
        }

        let _: FredValue = trx.exec(true).await.map_err(from_redis_error)?;
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> StoreResult<Option<String>> {
        self.client.get(key).await.map_err(from_redis_error)
    }

    async fn get_hash(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.client.hgetall(key).await.map_err(from_redis_error)
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        self.client
            .lrange(key, 0, -1)
            .await
            .map_err(from_redis_error)
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let ttl = self.key_ttl(key).await?;
        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(ttl_to_u64(ttl))))
        }
    }

    async fn set_hash_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        // HSET on a missing key would recreate it without a TTL, so an
        // already expired record would come back as an immortal stub.
        // Check existence first and accept the narrow expiry race.
        let count: i64 = self.client.exists(key).await.map_err(from_redis_error)?;
        if count == 0 {
            return Ok(());
        }
        self.client
            .hset::<(), _, _>(key, (field, value))
            .await
            .map_err(from_redis_error)
    }
}
