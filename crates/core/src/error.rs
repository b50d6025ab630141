//! Storage error model.

use thiserror::Error;

/// Result type used by every storage read the authorization core depends on.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a storage read.
///
/// Keep this focused on persistence failures. Authorization outcomes
/// (unauthorized, forbidden) belong to `gatekeep-auth`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend could not serve the read (connection, query, pool closed).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored document could not be decoded into its entity type.
    #[error("failed to decode stored document: {0}")]
    Decode(String),

    /// A single-entity lookup found nothing.
    #[error("{0} not found")]
    NotFound(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
