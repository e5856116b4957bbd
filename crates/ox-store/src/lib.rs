//! # ox-store
//!
//! Storage abstractions for the OIDC sandbox.
//!
//! Two traits cover the two consumers of the key-value layer:
//!
//! - [`Storage`] - the minimal set/get-with-TTL contract used by the
//!   relying-party orchestration for its own ephemeral metadata.
//! - [`RecordBackend`] - the richer contract (hashes, lists, atomic
//!   write batches) needed by the per-kind protocol-record adapter.
//!
//! The in-memory implementation lives here; the Redis implementation is
//! in `ox-store-redis`. Both implement both traits over one keyspace.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod storage;

pub use backend::{RecordBackend, WriteOp};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use storage::Storage;
