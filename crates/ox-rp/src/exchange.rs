//! Code-for-token exchange and userinfo retrieval.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use ox_core::{Error, Result};

use crate::discovery::ProviderMetadata;
use crate::metadata::ClientMetadata;

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// The issued access token.
    pub access_token: String,
    /// Token type, typically `Bearer`.
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// ID token for the authenticated end-user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Refresh token, if the grant allows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Decodes the ID token's claims without signature verification.
    /// Signature and nonce validation are the provider engine's
    /// responsibility in this deployment; the relying party only
    /// surfaces the claims for inspection.
    ///
    /// ## Errors
    ///
    /// Returns an upstream error for a structurally malformed token.
    pub fn claims(&self) -> Result<Value> {
        let Some(id_token) = &self.id_token else {
            return Ok(Value::Null);
        };
        let payload = id_token
            .split('.')
            .nth(1)
            .ok_or_else(|| Error::Upstream("id_token is not a compact JWT".to_string()))?;
        let decoded = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::Upstream(format!("id_token payload is not base64url: {e}")))?;
        serde_json::from_slice(&decoded)
            .map_err(|e| Error::Upstream(format!("id_token claims are not JSON: {e}")))
    }
}

/// Performs the server-side calls of the authorization code flow.
pub struct TokenClient {
    http: reqwest::Client,
}

impl TokenClient {
    /// Creates a client with its own HTTP connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// Must run server-side as it carries the client credentials. The
    /// PKCE verifier is sent for server-side challenge validation.
    ///
    /// ## Errors
    ///
    /// A failed exchange is fatal and surfaces as an upstream error.
    pub async fn exchange_code(
        &self,
        provider: &ProviderMetadata,
        metadata: &ClientMetadata,
        code: &str,
        state: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &metadata.client_id),
            ("client_secret", &metadata.client_secret),
            ("code_verifier", verifier),
            ("state", state),
        ];

        let response = self
            .http
            .post(&provider.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(code, verifier, error = %e, "failed to fetch token");
                Error::Upstream(format!("token request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(code, verifier, %status, body, "failed to fetch token");
            return Err(Error::Upstream(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        response
            .json::<TokenSet>()
            .await
            .map_err(|e| Error::Upstream(format!("malformed token response: {e}")))
    }

    /// Fetches all scoped claims from the userinfo endpoint.
    ///
    /// ## Errors
    ///
    /// Returns an upstream error; callers treat it as non-fatal since
    /// claims are supplementary.
    pub async fn userinfo(&self, provider: &ProviderMetadata, token: &TokenSet) -> Result<Value> {
        let endpoint = provider.userinfo_endpoint.as_ref().ok_or_else(|| {
            Error::Upstream("issuer does not advertise a userinfo endpoint".to_string())
        })?;

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to fetch user profile");
                Error::Upstream(format!("userinfo request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Upstream(format!("malformed userinfo response: {e}")))
    }
}

impl Default for TokenClient {
    fn default() -> Self {
        Self::new()
    }
}
