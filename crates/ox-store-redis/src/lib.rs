//! # ox-store-redis
//!
//! Redis storage implementation for the OIDC sandbox, built on the
//! `fred` client. Implements the `ox-store` traits: plain get/set with
//! TTL for the relying-party metadata, and hash/list/batch primitives
//! for protocol records. Multi-key record writes go through MULTI/EXEC
//! so readers never observe half a batch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod store;

pub use config::RedisConfig;
pub use store::RedisStore;
