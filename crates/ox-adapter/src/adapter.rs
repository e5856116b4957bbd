//! The per-kind record adapter.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use ox_core::{Clock, Error, Result};
use ox_store::{RecordBackend, WriteOp};

use crate::kind::{grant_key, uid_key, user_code_key, RecordKind};

/// Storage adapter for one record kind.
///
/// Stateless apart from the shared backend handle; the engine builds
/// one per kind through [`crate::AdapterFactory`].
pub struct RecordAdapter {
    kind: RecordKind,
    backend: Arc<dyn RecordBackend>,
    clock: Arc<dyn Clock>,
}

/// `expires_in` of zero or absent means the key is written without TTL.
fn normalize_ttl(expires_in: Option<u64>) -> Option<Duration> {
    expires_in.filter(|s| *s > 0).map(Duration::from_secs)
}

fn payload_field<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

impl RecordAdapter {
    pub(crate) fn new(
        kind: RecordKind,
        backend: Arc<dyn RecordBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            kind,
            backend,
            clock,
        }
    }

    /// The kind this adapter serves.
    #[must_use]
    pub const fn kind(&self) -> &RecordKind {
        &self.kind
    }

    fn key(&self, id: &str) -> String {
        self.kind.record_key(id)
    }

    /// Writes a record and its indices as one atomic batch.
    ///
    /// Consumable kinds go into a hash under a single `payload` field so
    /// `consume` can later add a `consumed` field next to it; other
    /// kinds are stored as a serialized blob. When the payload carries a
    /// `grantId`, the primary key is appended to that grant's index list
    /// and the list's TTL is raised to at least the record's (never
    /// shortened). `userCode` and `uid` fields get their own index
    /// entries with the record's TTL.
    ///
    /// Re-upserting an id replaces the payload; indices written by the
    /// previous upsert are not retroactively cleaned, matching the
    /// engine's storage contract. They expire on their own TTL.
    ///
    /// ## Errors
    ///
    /// Returns a validation error if the payload cannot be serialized
    /// and a transport error if the backend write fails.
    pub async fn upsert(&self, id: &str, payload: &Value, expires_in: Option<u64>) -> Result<()> {
        let key = self.key(id);
        let ttl = normalize_ttl(expires_in);
        let serialized =
            serde_json::to_string(payload).map_err(|e| Error::Validation(e.to_string()))?;

        let mut ops = Vec::with_capacity(4);
        if self.kind.consumable {
            ops.push(WriteOp::PutHash {
                key: key.clone(),
                fields: vec![("payload".to_string(), serialized)],
                ttl,
            });
        } else {
            ops.push(WriteOp::PutBlob {
                key: key.clone(),
                value: serialized,
                ttl,
            });
        }

        if self.kind.grantable {
            if let Some(grant_id) = payload_field(payload, "grantId") {
                ops.push(WriteOp::ListPush {
                    key: grant_key(grant_id),
                    value: key.clone(),
                    min_ttl: ttl,
                });
            }
        }
        if let Some(user_code) = payload_field(payload, "userCode") {
            ops.push(WriteOp::PutBlob {
                key: user_code_key(user_code),
                value: id.to_string(),
                ttl,
            });
        }
        if let Some(uid) = payload_field(payload, "uid") {
            ops.push(WriteOp::PutBlob {
                key: uid_key(uid),
                value: id.to_string(),
                ttl,
            });
        }

        debug!(kind = %self.kind.name, id, ops = ops.len(), "upsert record");
        self.backend.apply(ops).await?;
        Ok(())
    }

    /// Returns the record's payload, or `None` if it is absent or
    /// expired.
    ///
    /// For consumable kinds the stored `payload` JSON is merged with the
    /// remaining hash fields (notably `consumed`); payload fields win on
    /// collision.
    ///
    /// ## Errors
    ///
    /// Returns a validation error when the stored data is malformed.
    pub async fn find(&self, id: &str) -> Result<Option<Value>> {
        let key = self.key(id);
        if self.kind.consumable {
            let mut fields = self.backend.get_hash(&key).await?;
            if fields.is_empty() {
                return Ok(None);
            }
            let raw = fields
                .remove("payload")
                .ok_or_else(|| Error::Validation(format!("record {key} has no payload field")))?;
            let parsed: Value =
                serde_json::from_str(&raw).map_err(|e| Error::Validation(e.to_string()))?;
            let Value::Object(mut merged) = parsed else {
                return Err(Error::Validation(format!("record {key} is not an object")));
            };
            for (field, value) in fields {
                merged
                    .entry(field)
                    .or_insert_with(|| match value.parse::<u64>() {
                        Ok(n) => Value::from(n),
                        Err(_) => Value::String(value),
                    });
            }
            Ok(Some(Value::Object(merged)))
        } else {
            match self.backend.get_blob(&key).await? {
                Some(raw) => {
                    let parsed =
                        serde_json::from_str(&raw).map_err(|e| Error::Validation(e.to_string()))?;
                    Ok(Some(parsed))
                }
                None => Ok(None),
            }
        }
    }

    /// Looks a record up through the `uid -> id` index.
    ///
    /// ## Errors
    ///
    /// Propagates backend and deserialization failures from [`find`].
    ///
    /// [`find`]: Self::find
    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<Value>> {
        match self.backend.get_blob(&uid_key(uid)).await? {
            Some(id) => self.find(&id).await,
            None => Ok(None),
        }
    }

    /// Looks a record up through the `userCode -> id` index.
    ///
    /// ## Errors
    ///
    /// Propagates backend and deserialization failures from [`find`].
    ///
    /// [`find`]: Self::find
    pub async fn find_by_user_code(&self, user_code: &str) -> Result<Option<Value>> {
        match self.backend.get_blob(&user_code_key(user_code)).await? {
            Some(id) => self.find(&id).await,
            None => Ok(None),
        }
    }

    /// Deletes the primary key. Index entries are left to expire on
    /// their own TTL.
    ///
    /// ## Errors
    ///
    /// Returns a transport error if the backend write fails.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        debug!(kind = %self.kind.name, id, "destroy record");
        self.backend
            .apply(vec![WriteOp::Delete { key: self.key(id) }])
            .await?;
        Ok(())
    }

    /// Deletes every record listed under the grant plus the grant index
    /// itself, as one atomic batch. An absent grant index is a no-op.
    ///
    /// ## Errors
    ///
    /// Returns a transport error if the backend read or write fails.
    pub async fn revoke_by_grant_id(&self, grant_id: &str) -> Result<()> {
        let grant = grant_key(grant_id);
        let keys = self.backend.list_range(&grant).await?;
        debug!(kind = %self.kind.name, grant_id, records = keys.len(), "revoke grant");

        let mut ops: Vec<WriteOp> = keys.into_iter().map(|key| WriteOp::Delete { key }).collect();
        ops.push(WriteOp::Delete { key: grant });
        self.backend.apply(ops).await?;
        Ok(())
    }

    /// Marks the record consumed at the current Unix timestamp.
    ///
    /// The record stays retrievable (with `consumed` set) until its
    /// original TTL elapses; consuming never touches the TTL. A no-op
    /// when the record has already expired, so the engine racing with
    /// expiry never sees an error.
    ///
    /// ## Errors
    ///
    /// Returns a transport error if the backend write fails.
    pub async fn consume(&self, id: &str) -> Result<()> {
        let epoch = self.clock.unix_seconds();
        self.backend
            .set_hash_field(&self.key(id), "consumed", &epoch.to_string())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::AdapterFactory;
    use ox_core::ManualClock;
    use ox_store::MemoryStore;
    use serde_json::json;

    fn factory() -> (AdapterFactory, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (AdapterFactory::with_clock(store, clock.clone()), clock)
    }

    #[tokio::test]
    async fn blob_record_round_trip() {
        let (factory, _) = factory();
        let tokens = factory.adapter("AccessToken");
        let payload = json!({"grantId": "g1", "jti": "tok1", "scope": "openid"});

        tokens.upsert("tok1", &payload, Some(60)).await.unwrap();
        assert_eq!(tokens.find("tok1").await.unwrap(), Some(payload));
    }

    #[tokio::test]
    async fn hash_record_round_trip() {
        let (factory, _) = factory();
        let codes = factory.adapter("AuthorizationCode");
        let payload = json!({"grantId": "g1", "redirectUri": "https://rp/cb"});

        codes.upsert("c1", &payload, Some(60)).await.unwrap();
        assert_eq!(codes.find("c1").await.unwrap(), Some(payload));
    }

    #[tokio::test]
    async fn find_after_ttl_is_absent() {
        let (factory, clock) = factory();
        let tokens = factory.adapter("AccessToken");
        tokens
            .upsert("tok1", &json!({"a": 1}), Some(60))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(61));
        assert_eq!(tokens.find("tok1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_ttl_means_no_expiry() {
        let (factory, clock) = factory();
        let sessions = factory.adapter("Session");
        sessions.upsert("s1", &json!({"uid": "u1"}), Some(0)).await.unwrap();
        sessions.upsert("s2", &json!({}), None).await.unwrap();

        clock.advance(Duration::from_secs(1_000_000));
        assert!(sessions.find("s1").await.unwrap().is_some());
        assert!(sessions.find("s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn consume_marks_in_place_and_is_idempotent() {
        let (factory, clock) = factory();
        let codes = factory.adapter("AuthorizationCode");
        codes
            .upsert("c1", &json!({"grantId": "g1"}), Some(600))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(100));
        codes.consume("c1").await.unwrap();
        let found = codes.find("c1").await.unwrap().unwrap();
        assert_eq!(found["consumed"], json!(100));
        assert_eq!(found["grantId"], json!("g1"));

        clock.advance(Duration::from_secs(50));
        codes.consume("c1").await.unwrap();
        let again = codes.find("c1").await.unwrap().unwrap();
        assert_eq!(again["consumed"], json!(150));

        // Consuming never extends the original TTL.
        clock.advance(Duration::from_secs(451));
        assert_eq!(codes.find("c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn consume_after_expiry_is_silent() {
        let (factory, clock) = factory();
        let codes = factory.adapter("AuthorizationCode");
        codes.upsert("c1", &json!({}), Some(10)).await.unwrap();

        clock.advance(Duration::from_secs(11));
        codes.consume("c1").await.unwrap();
        assert_eq!(codes.find("c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoke_cascades_over_one_grant_only() {
        let (factory, _) = factory();
        let tokens = factory.adapter("AccessToken");
        let codes = factory.adapter("AuthorizationCode");

        tokens
            .upsert("tok1", &json!({"grantId": "g1"}), Some(60))
            .await
            .unwrap();
        codes
            .upsert("c1", &json!({"grantId": "g1"}), Some(60))
            .await
            .unwrap();
        tokens
            .upsert("tok2", &json!({"grantId": "g2"}), Some(60))
            .await
            .unwrap();

        tokens.revoke_by_grant_id("g1").await.unwrap();

        assert_eq!(tokens.find("tok1").await.unwrap(), None);
        assert_eq!(codes.find("c1").await.unwrap(), None);
        assert!(tokens.find("tok2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_absent_grant_is_noop() {
        let (factory, _) = factory();
        let tokens = factory.adapter("AccessToken");
        tokens.revoke_by_grant_id("nope").await.unwrap();
    }

    #[tokio::test]
    async fn grant_list_outlives_shorter_records() {
        let (factory, clock) = factory();
        let tokens = factory.adapter("AccessToken");

        tokens
            .upsert("long", &json!({"grantId": "g1"}), Some(600))
            .await
            .unwrap();
        tokens
            .upsert("short", &json!({"grantId": "g1"}), Some(10))
            .await
            .unwrap();

        // The short record must not shrink the grant index TTL.
        clock.advance(Duration::from_secs(500));
        tokens.revoke_by_grant_id("g1").await.unwrap();
        assert_eq!(tokens.find("long").await.unwrap(), None);
    }

    #[tokio::test]
    async fn user_code_lookup_matches_find() {
        let (factory, clock) = factory();
        let device = factory.adapter("DeviceCode");
        let payload = json!({"grantId": "g1", "userCode": "WDJB-MJHT"});

        device.upsert("d1", &payload, Some(600)).await.unwrap();
        assert_eq!(
            device.find_by_user_code("WDJB-MJHT").await.unwrap(),
            device.find("d1").await.unwrap()
        );

        clock.advance(Duration::from_secs(601));
        assert_eq!(device.find_by_user_code("WDJB-MJHT").await.unwrap(), None);
        assert_eq!(device.find("d1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn uid_lookup_resolves_session() {
        let (factory, _) = factory();
        let sessions = factory.adapter("Session");
        let payload = json!({"uid": "u1", "accountId": "alice"});

        sessions.upsert("s1", &payload, Some(3600)).await.unwrap();
        assert_eq!(sessions.find_by_uid("u1").await.unwrap(), Some(payload));
        assert_eq!(sessions.find_by_uid("u2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn destroy_removes_primary_but_leaves_index() {
        let (factory, _) = factory();
        let device = factory.adapter("DeviceCode");
        device
            .upsert("d1", &json!({"userCode": "WDJB-MJHT"}), Some(600))
            .await
            .unwrap();

        device.destroy("d1").await.unwrap();
        assert_eq!(device.find("d1").await.unwrap(), None);
        // The stale index entry resolves to nothing once the record is
        // gone.
        assert_eq!(device.find_by_user_code("WDJB-MJHT").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reupsert_replaces_payload() {
        let (factory, _) = factory();
        let tokens = factory.adapter("AccessToken");
        tokens.upsert("tok1", &json!({"v": 1}), Some(60)).await.unwrap();
        tokens.upsert("tok1", &json!({"v": 2}), Some(60)).await.unwrap();
        assert_eq!(tokens.find("tok1").await.unwrap(), Some(json!({"v": 2})));
    }
}
