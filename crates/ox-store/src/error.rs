//! Storage error types.

use std::fmt;

/// Storage operation errors.
#[derive(Debug)]
pub enum StoreError {
    /// Connection to the storage backend failed.
    Connection(String),
    /// Serialization/deserialization error. Malformed stored JSON is a
    /// programming error, not a transient condition; it is never retried.
    Serialization(String),
    /// Invalid backend configuration.
    Configuration(String),
    /// Internal backend error.
    Internal(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "store connection error: {msg}"),
            Self::Serialization(msg) => write!(f, "store serialization error: {msg}"),
            Self::Configuration(msg) => write!(f, "store configuration error: {msg}"),
            Self::Internal(msg) => write!(f, "internal store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ox_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(msg) => Self::Validation(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::Connection("refused".to_string());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn serialization_maps_to_validation() {
        let err: ox_core::Error = StoreError::Serialization("bad json".to_string()).into();
        assert_eq!(err.http_status(), 400);

        let err: ox_core::Error = StoreError::Connection("down".to_string()).into();
        assert_eq!(err.http_status(), 500);
    }
}
