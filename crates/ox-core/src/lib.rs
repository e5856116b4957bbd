//! # ox-core
//!
//! Shared building blocks for the OIDC sandbox workspace: the error
//! taxonomy used across the storage and relying-party layers, and an
//! injectable clock so TTL behavior can be driven by tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
