//! Relying-party HTTP endpoints.
//!
//! - `GET /oauth/clients` lists the default and predefined clients.
//! - `POST /oauth/clients` registers a custom client dynamically.
//! - `GET /oauth/authorize` redirects to the upstream provider.
//! - `POST /oauth/token` redeems an authorization code.
//! - `GET /oauth/logout` redirects to the upstream end-session endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use ox_core::Error;

use crate::discovery::DiscoveryCache;
use crate::error::HandlerResult;
use crate::exchange::TokenClient;
use crate::metadata::{ClientMetadata, ClientRegistry};
use crate::pkce;

/// Shared state for the relying-party routes.
#[derive(Clone)]
pub struct RpState {
    /// Client metadata resolution and registration.
    pub registry: Arc<ClientRegistry>,
    /// Memoized provider discovery.
    pub discovery: Arc<DiscoveryCache>,
    /// Token and userinfo HTTP client.
    pub tokens: Arc<TokenClient>,
    /// Public base URL of this deployment.
    pub public_url: String,
}

/// 302 Found; browsers follow it with a GET regardless of the original
/// method.
fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

/// Builds the relying-party router.
pub fn router(state: RpState) -> Router {
    Router::new()
        .route("/oauth/clients", get(list_clients).post(register_client))
        .route("/oauth/authorize", get(authorize))
        .route("/oauth/token", post(token))
        .route("/oauth/logout", get(logout))
        .with_state(state)
}

/// Public listing entry for one client.
#[derive(Debug, Serialize, Deserialize)]
struct ClientSummary {
    issuer: String,
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<String>,
}

/// GET `/oauth/clients`
async fn list_clients(State(state): State<RpState>) -> HandlerResult<Json<Vec<ClientSummary>>> {
    debug!("return predefined OIDC clients");

    let mut candidates = vec![state.registry.default_client().clone()];
    candidates.extend(state.registry.predefined().iter().cloned());

    // Resolve each id through the full chain so a dynamic registration
    // shadowing a predefined id shows its current metadata.
    let mut results = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let key = ClientMetadata::register_key(&candidate.client_id);
        if let Some(metadata) = state.registry.get_metadata(&key).await? {
            results.push(ClientSummary {
                issuer: metadata.issuer,
                client_id: metadata.client_id,
                redirect_uri: metadata.redirect_uri,
            });
        }
    }
    Ok(Json(results))
}

/// POST `/oauth/clients`
async fn register_client(
    State(state): State<RpState>,
    Json(body): Json<ClientMetadata>,
) -> HandlerResult<Json<Value>> {
    let metadata = ClientMetadata {
        redirect_uri: body
            .redirect_uri
            .or_else(|| state.registry.default_client().redirect_uri.clone()),
        ..body
    };
    info!(client_id = %metadata.client_id, issuer = %metadata.issuer, "register OIDC client");

    state.registry.register(&metadata).await?;
    Ok(Json(json!({ "status": "Ok" })))
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    /// Identifier of a preregistered client to use for the request.
    client_id: Option<String>,
    /// OAuth 2.0 response type; defaults to the authorization code flow.
    response_type: Option<String>,
    /// How the authorization response is returned; defaults to `query`.
    response_mode: Option<String>,
    /// Callback override; must match a registration at the provider.
    redirect_uri: Option<String>,
    /// Preferred UI languages, space-separated BCP47 tags.
    ui_locales: Option<String>,
    /// Prepopulated login prompt value.
    login_hint: Option<String>,
}

/// GET `/oauth/authorize`
async fn authorize(
    State(state): State<RpState>,
    Query(query): Query<AuthorizeQuery>,
) -> HandlerResult<Response> {
    info!(client_id = ?query.client_id, "generate authorization request");

    let state_param = pkce::random_token();
    let nonce = pkce::random_token();
    let verifier = pkce::verifier_from_state(&state_param);
    let challenge = pkce::challenge(&verifier);

    let stored = match &query.client_id {
        Some(client_id) => {
            state
                .registry
                .get_metadata(&ClientMetadata::register_key(client_id))
                .await?
        }
        None => None,
    };
    let metadata = stored
        .map_or_else(
            || state.registry.default_client().clone(),
            |stored| state.registry.default_client().merged_with(&stored),
        )
        .with_overrides(query.redirect_uri.as_deref(), Some(&nonce));

    // Discovery failures abort the request; no redirect is issued.
    let provider = state.discovery.discover(&metadata.issuer).await?;

    // Memorize the attempt's metadata for the token endpoint.
    state.registry.store_verifier(&verifier, &metadata).await?;

    let mut params: Vec<(&str, String)> = vec![
        ("client_id", metadata.client_id.clone()),
        ("prompt", "login".to_string()),
        ("scope", "openid profile email".to_string()),
        (
            "response_type",
            query.response_type.unwrap_or_else(|| "code".to_string()),
        ),
        (
            "response_mode",
            query.response_mode.unwrap_or_else(|| "query".to_string()),
        ),
        ("nonce", nonce),
        ("state", state_param),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256".to_string()),
    ];
    if let Some(redirect_uri) = &metadata.redirect_uri {
        params.push(("redirect_uri", redirect_uri.clone()));
    }
    if let Some(ui_locales) = query.ui_locales {
        params.push(("ui_locales", ui_locales));
    }
    if let Some(login_hint) = query.login_hint {
        params.push(("login_hint", login_hint));
    }

    let query_string = params
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    let url = format!("{}?{query_string}", provider.authorization_endpoint);

    debug!(url, "generated authorization request");
    Ok(found(&url))
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    /// Pairs the callback with the verifier stored at authorize time.
    state: String,
    /// Authorization code from the code flow response.
    code: String,
    /// Response from the implicit flow, unused in the exchange.
    #[allow(dead_code)]
    id_token: Option<String>,
}

/// POST `/oauth/token`
async fn token(
    State(state): State<RpState>,
    Json(body): Json<TokenRequest>,
) -> HandlerResult<Json<Value>> {
    info!(code = %body.code, "received token request with authorization code");

    let verifier = pkce::verifier_from_state(&body.state);
    let metadata = state
        .registry
        .get_metadata(&ClientMetadata::verifier_key(&verifier))
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("no OpenID metadata found for verifier: {verifier}"))
        })?;

    let provider = state.discovery.discover(&metadata.issuer).await?;
    let redirect_uri = metadata
        .redirect_uri
        .clone()
        .unwrap_or_else(|| format!("{}/oauth/callback", state.public_url));

    let token_set = state
        .tokens
        .exchange_code(
            &provider,
            &metadata,
            &body.code,
            &body.state,
            &verifier,
            &redirect_uri,
        )
        .await?;
    let claims = token_set.claims()?;

    // Userinfo is supplementary; a failure annotates the response
    // instead of aborting the exchange.
    let userinfo = match state.tokens.userinfo(&provider, &token_set).await {
        Ok(userinfo) => userinfo,
        Err(err) => json!({ "error": err.to_string() }),
    };

    Ok(Json(json!({
        "id_token": claims,
        "token": token_set,
        "userinfo": userinfo,
    })))
}

#[derive(Debug, Deserialize)]
struct LogoutQuery {
    client_id: Option<String>,
}

/// GET `/oauth/logout`
async fn logout(
    State(state): State<RpState>,
    Query(query): Query<LogoutQuery>,
) -> HandlerResult<Response> {
    let metadata = match &query.client_id {
        Some(client_id) => {
            state
                .registry
                .get_metadata(&ClientMetadata::register_key(client_id))
                .await?
        }
        None => None,
    }
    .ok_or_else(|| Error::NotFound("no OpenID metadata found for relying party".to_string()))?;

    let provider = state.discovery.discover(&metadata.issuer).await?;
    let end_session = provider.end_session_endpoint.ok_or_else(|| {
        Error::Upstream("issuer does not advertise an end_session_endpoint".to_string())
    })?;

    info!(client_id = %metadata.client_id, "redirect to end_session_endpoint");
    Ok(found(&end_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Discoverer, ProviderMetadata};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use ox_core::Result;
    use ox_store::{MemoryStore, Storage};
    use tower::ServiceExt;

    struct StubDiscoverer;

    #[async_trait]
    impl Discoverer for StubDiscoverer {
        async fn discover(&self, issuer: &str) -> Result<ProviderMetadata> {
            Ok(ProviderMetadata {
                issuer: issuer.to_string(),
                authorization_endpoint: format!("{issuer}/auth"),
                token_endpoint: format!("{issuer}/token"),
                userinfo_endpoint: Some(format!("{issuer}/me")),
                end_session_endpoint: Some(format!("{issuer}/session/end")),
            })
        }
    }

    fn test_state(storage: Arc<MemoryStore>) -> RpState {
        let predefined = vec![ClientMetadata {
            issuer: "https://idp.example.com".to_string(),
            client_id: "partner".to_string(),
            client_secret: "partner-secret".to_string(),
            redirect_uri: None,
            nonce: None,
        }];
        RpState {
            registry: Arc::new(ClientRegistry::new(
                storage,
                predefined,
                "https://rp.example.com",
            )),
            discovery: Arc::new(DiscoveryCache::new(Arc::new(StubDiscoverer))),
            tokens: Arc::new(TokenClient::new()),
            public_url: "https://rp.example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_default_and_predefined_clients() {
        let app = router(test_state(Arc::new(MemoryStore::new())));
        let response = app
            .oneshot(Request::get("/oauth/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let clients: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0]["client_id"], "oidc-client");
        assert_eq!(clients[1]["client_id"], "partner");
        assert!(clients[0].get("client_secret").is_none());
    }

    #[tokio::test]
    async fn registering_default_client_id_is_forbidden() {
        let app = router(test_state(Arc::new(MemoryStore::new())));
        let body = json!({
            "issuer": "https://evil.example.com",
            "client_id": "oidc-client",
            "client_secret": "oops",
        });
        let response = app
            .oneshot(
                Request::post("/oauth/clients")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn authorize_redirects_and_stores_verifier_metadata() {
        let storage = Arc::new(MemoryStore::new());
        let app = router(test_state(storage.clone()));
        let response = app
            .oneshot(
                Request::get("/oauth/authorize?client_id=partner&login_hint=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()["location"].to_str().unwrap().to_string();
        assert!(location.starts_with("https://idp.example.com/auth?"));
        assert!(location.contains("client_id=partner"));
        assert!(location.contains("code_challenge_method=S256"));
        assert!(location.contains("response_type=code"));
        assert!(location.contains("response_mode=query"));
        assert!(location.contains("login_hint=alice"));

        let state_value = location
            .split('&')
            .find_map(|pair| pair.strip_prefix("state="))
            .unwrap()
            .to_string();
        let verifier = pkce::verifier_from_state(&state_value);
        let stored = storage
            .get_item(&ClientMetadata::verifier_key(&verifier))
            .await
            .unwrap()
            .expect("verifier metadata stored");
        assert_eq!(stored["client_id"], "partner");
        assert_eq!(stored["issuer"], "https://idp.example.com");
    }

    #[tokio::test]
    async fn token_with_unknown_state_is_not_found() {
        let app = router(test_state(Arc::new(MemoryStore::new())));
        let body = json!({ "state": "never-issued", "code": "c1" });
        let response = app
            .oneshot(
                Request::post("/oauth/token")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_without_client_id_is_not_found() {
        let app = router(test_state(Arc::new(MemoryStore::new())));
        let response = app
            .oneshot(Request::get("/oauth/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_redirects_to_end_session_endpoint() {
        let app = router(test_state(Arc::new(MemoryStore::new())));
        let response = app
            .oneshot(
                Request::get("/oauth/logout?client_id=partner")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()["location"],
            "https://idp.example.com/session/end"
        );
    }
}
