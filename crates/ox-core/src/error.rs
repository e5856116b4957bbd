//! Error taxonomy for the sandbox.
//!
//! Five failure classes cover everything this layer can produce. None of
//! them are retried here; retries belong to the backend driver or the
//! caller restarting the whole flow.

use thiserror::Error;

/// Result type alias using the sandbox error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sandbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required metadata or record is absent (unknown verifier, unknown
    /// client key). No fallback exists for these lookups.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted mutation of a protected client id.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Input or stored data failed schema validation. Never coerced.
    #[error("validation error: {0}")]
    Validation(String),

    /// Discovery or token exchange against the upstream provider failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Storage backend unreachable. Fails the request, not the process.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::Validation(_) => 400,
            Self::Upstream(_) => 502,
            Self::Transport(_) => 500,
        }
    }

    /// Returns whether this error represents a client error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Forbidden(_) | Self::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Error::NotFound("x".into()).http_status(), 404);
        assert_eq!(Error::Forbidden("x".into()).http_status(), 403);
        assert_eq!(Error::Validation("x".into()).http_status(), 400);
        assert_eq!(Error::Upstream("x".into()).http_status(), 502);
        assert_eq!(Error::Transport("x".into()).http_status(), 500);
    }

    #[test]
    fn client_error_classification() {
        assert!(Error::NotFound("x".into()).is_client_error());
        assert!(Error::Forbidden("x".into()).is_client_error());
        assert!(!Error::Upstream("x".into()).is_client_error());
        assert!(!Error::Transport("x".into()).is_client_error());
    }
}
