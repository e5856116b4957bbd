//! # ox-adapter
//!
//! Per-kind protocol-record persistence for the OIDC sandbox.
//!
//! The external OIDC engine stores every protocol artifact (access
//! tokens, authorization codes, device codes, grants, sessions) through
//! a per-kind adapter contract: `upsert`, `find`, `find_by_uid`,
//! `find_by_user_code`, `destroy`, `revoke_by_grant_id`, `consume`.
//! [`RecordAdapter`] implements that contract over any
//! `ox_store::RecordBackend`, maintaining the secondary indices and the
//! grant list used for cascading revocation. [`AdapterFactory`] hands
//! out one adapter per record-kind name.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod factory;
pub mod kind;

pub use adapter::RecordAdapter;
pub use factory::AdapterFactory;
pub use kind::RecordKind;
