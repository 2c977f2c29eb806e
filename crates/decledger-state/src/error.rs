//! Error types for decledger-state

use thiserror::Error;

/// Errors that can occur in the stage persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend (database) failure
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Connection or namespace selection failed
    #[error("database connection failed: {0}")]
    Connection(String),

    /// Record could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Digest string is not 64 lowercase hex characters
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_error_converts() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StorageError = bad.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
