use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The record does not exist or has been soft-deleted.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    /// The stored version no longer matches the version the caller read.
    #[error("match `{id}` was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Shorthand for a missing match record.
    pub fn match_not_found(id: Uuid) -> Self {
        StorageError::NotFound { entity: "match", id }
    }
}
