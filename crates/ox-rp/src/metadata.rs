//! Client metadata and the resolution chain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ox_core::{Error, Result};
use ox_store::Storage;

/// Registration TTL for dynamically registered clients.
pub const REGISTRATION_TTL_SECS: u64 = 86_400;

/// TTL for per-attempt verifier metadata.
pub const VERIFIER_TTL_SECS: u64 = 300;

/// Client id of the built-in default client.
pub const DEFAULT_CLIENT_ID: &str = "oidc-client";

/// Relying-party client registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Absolute `OpenID` issuer URL for this relying party.
    pub issuer: String,
    /// Client id used for the authorization request.
    pub client_id: String,
    /// Matching client secret.
    pub client_secret: String,
    /// Redirection URI registered at the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Nonce bound to one authorization attempt, present only in
    /// verifier metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl ClientMetadata {
    /// Storage key for a registered client.
    #[must_use]
    pub fn register_key(client_id: &str) -> String {
        format!("oidc:register:{client_id}")
    }

    /// Storage key for one authorization attempt's metadata.
    #[must_use]
    pub fn verifier_key(verifier: &str) -> String {
        format!("oidc:verifier:{verifier}")
    }

    /// The built-in default client for a deployment's public URL.
    #[must_use]
    pub fn default_client(public_url: &str) -> Self {
        Self {
            issuer: public_url.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: "oidc-secret".to_string(),
            redirect_uri: Some(format!("{public_url}/oauth/callback")),
            nonce: None,
        }
    }

    /// Checks the required fields are non-empty.
    ///
    /// ## Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("issuer", &self.issuer),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.is_empty() {
                return Err(Error::Validation(format!(
                    "client metadata field {field} must be a non-empty string"
                )));
            }
        }
        Ok(())
    }

    /// Overlays `other` on top of `self`. Required fields always win;
    /// optional fields only override when present.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        Self {
            issuer: other.issuer.clone(),
            client_id: other.client_id.clone(),
            client_secret: other.client_secret.clone(),
            redirect_uri: other.redirect_uri.clone().or_else(|| self.redirect_uri.clone()),
            nonce: other.nonce.clone().or_else(|| self.nonce.clone()),
        }
    }

    /// Applies per-request `redirect_uri`/`nonce` overrides. Absent
    /// values never clobber a present one.
    #[must_use]
    pub fn with_overrides(&self, redirect_uri: Option<&str>, nonce: Option<&str>) -> Self {
        Self {
            redirect_uri: redirect_uri
                .map(ToString::to_string)
                .or_else(|| self.redirect_uri.clone()),
            nonce: nonce.map(ToString::to_string).or_else(|| self.nonce.clone()),
            ..self.clone()
        }
    }
}

/// Resolves client metadata by storage key through an ordered chain:
/// dynamically registered, then predefined from configuration, then the
/// built-in default. The default matches only its own registration key;
/// any other unresolved key yields `None`.
pub struct ClientRegistry {
    storage: Arc<dyn Storage>,
    predefined: Vec<ClientMetadata>,
    default: ClientMetadata,
}

impl ClientRegistry {
    /// Creates a registry over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, predefined: Vec<ClientMetadata>, public_url: &str) -> Self {
        Self {
            storage,
            predefined,
            default: ClientMetadata::default_client(public_url),
        }
    }

    /// The built-in default client.
    #[must_use]
    pub const fn default_client(&self) -> &ClientMetadata {
        &self.default
    }

    /// The predefined clients from configuration.
    #[must_use]
    pub fn predefined(&self) -> &[ClientMetadata] {
        &self.predefined
    }

    /// Returns true when the id belongs to the default or a predefined
    /// client, which dynamic registration must not overwrite.
    #[must_use]
    pub fn is_protected(&self, client_id: &str) -> bool {
        self.default.client_id == client_id
            || self.predefined.iter().any(|c| c.client_id == client_id)
    }

    /// Resolves metadata stored under `key`.
    ///
    /// Works for both registration keys and verifier keys; the latter
    /// only ever resolve through the storage step.
    ///
    /// ## Errors
    ///
    /// Stored data that fails schema validation is a validation error,
    /// never silently ignored; storage failures propagate as transport
    /// errors.
    pub async fn get_metadata(&self, key: &str) -> Result<Option<ClientMetadata>> {
        if let Some(stored) = self.storage.get_item(key).await? {
            return Ok(Some(parse_metadata(stored)?));
        }

        let predefined = self
            .predefined
            .iter()
            .find(|c| ClientMetadata::register_key(&c.client_id) == key);
        if let Some(found) = predefined {
            found.validate()?;
            return Ok(Some(found.clone()));
        }

        if ClientMetadata::register_key(&self.default.client_id) == key {
            return Ok(Some(self.default.clone()));
        }
        Ok(None)
    }

    /// Stores a registration under the client's registration key,
    /// replacing any prior registration for that id.
    ///
    /// ## Errors
    ///
    /// Returns a forbidden error for protected client ids.
    pub async fn register(&self, metadata: &ClientMetadata) -> Result<()> {
        if self.default.client_id == metadata.client_id {
            return Err(Error::Forbidden(
                "default OIDC client is protected".to_string(),
            ));
        }
        if self.predefined.iter().any(|c| c.client_id == metadata.client_id) {
            return Err(Error::Forbidden(
                "predefined clients are protected".to_string(),
            ));
        }
        metadata.validate()?;

        let value =
            serde_json::to_value(metadata).map_err(|e| Error::Validation(e.to_string()))?;
        self.storage
            .set_item(
                &ClientMetadata::register_key(&metadata.client_id),
                &value,
                Some(std::time::Duration::from_secs(REGISTRATION_TTL_SECS)),
            )
            .await?;
        Ok(())
    }

    /// Stores one attempt's verifier metadata with its short TTL.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures as transport errors.
    pub async fn store_verifier(&self, verifier: &str, metadata: &ClientMetadata) -> Result<()> {
        let value =
            serde_json::to_value(metadata).map_err(|e| Error::Validation(e.to_string()))?;
        self.storage
            .set_item(
                &ClientMetadata::verifier_key(verifier),
                &value,
                Some(std::time::Duration::from_secs(VERIFIER_TTL_SECS)),
            )
            .await?;
        Ok(())
    }
}

fn parse_metadata(value: Value) -> Result<ClientMetadata> {
    let metadata: ClientMetadata =
        serde_json::from_value(value).map_err(|e| Error::Validation(e.to_string()))?;
    metadata.validate()?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ox_store::MemoryStore;

    fn registry(predefined: Vec<ClientMetadata>) -> ClientRegistry {
        ClientRegistry::new(
            Arc::new(MemoryStore::new()),
            predefined,
            "https://rp.example.com",
        )
    }

    fn predefined_client() -> ClientMetadata {
        ClientMetadata {
            issuer: "https://idp.example.com".to_string(),
            client_id: "partner".to_string(),
            client_secret: "partner-secret".to_string(),
            redirect_uri: None,
            nonce: None,
        }
    }

    #[tokio::test]
    async fn resolves_registered_before_predefined() {
        let registry = registry(vec![predefined_client()]);
        let mut registered = predefined_client();
        registered.client_id = "custom".to_string();
        registry.register(&registered).await.unwrap();

        let found = registry
            .get_metadata(&ClientMetadata::register_key("custom"))
            .await
            .unwrap();
        assert_eq!(found, Some(registered));
    }

    #[tokio::test]
    async fn resolves_predefined_and_default() {
        let registry = registry(vec![predefined_client()]);

        let found = registry
            .get_metadata(&ClientMetadata::register_key("partner"))
            .await
            .unwrap();
        assert_eq!(found, Some(predefined_client()));

        let found = registry
            .get_metadata(&ClientMetadata::register_key(DEFAULT_CLIENT_ID))
            .await
            .unwrap();
        assert_eq!(found.as_ref(), Some(registry.default_client()));
    }

    #[tokio::test]
    async fn unknown_key_resolves_to_none() {
        let registry = registry(vec![]);
        let found = registry
            .get_metadata(&ClientMetadata::register_key("missing"))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn registration_of_protected_ids_is_forbidden() {
        let registry = registry(vec![predefined_client()]);

        let mut metadata = predefined_client();
        metadata.client_id = DEFAULT_CLIENT_ID.to_string();
        let err = registry.register(&metadata).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = registry.register(&predefined_client()).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn invalid_stored_metadata_is_a_validation_error() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set_item(
                &ClientMetadata::register_key("broken"),
                &serde_json::json!({"issuer": "https://idp", "client_id": "broken"}),
                None,
            )
            .await
            .unwrap();
        let registry =
            ClientRegistry::new(storage, vec![], "https://rp.example.com");

        let err = registry
            .get_metadata(&ClientMetadata::register_key("broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn overrides_never_clobber_with_absent_values() {
        let base = ClientMetadata::default_client("https://rp.example.com");
        let merged = base.with_overrides(None, Some("n1"));
        assert_eq!(merged.redirect_uri, base.redirect_uri);
        assert_eq!(merged.nonce.as_deref(), Some("n1"));

        let merged = base.with_overrides(Some("https://other/cb"), None);
        assert_eq!(merged.redirect_uri.as_deref(), Some("https://other/cb"));
    }
}
