//! # ox-rp
//!
//! A general-purpose `OpenID` Connect Relying Party for request
//! orchestration:
//!
//! - Generates PKCE-protected authorization requests and redirects the
//!   browser to the upstream provider.
//! - Persists per-attempt verifier metadata so the later token exchange
//!   knows which client and issuer to use.
//! - Resolves client metadata through a registered/predefined/default
//!   strategy chain, with dynamic registration for custom providers.
//! - Exchanges authorization codes for tokens and userinfo claims.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod discovery;
pub mod error;
pub mod exchange;
pub mod handlers;
pub mod metadata;
pub mod pkce;

pub use discovery::{Discoverer, DiscoveryCache, HttpDiscoverer, ProviderMetadata};
pub use handlers::{router, RpState};
pub use metadata::{ClientMetadata, ClientRegistry};
