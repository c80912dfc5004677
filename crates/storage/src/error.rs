//! Error types for blob storage operations.

use thiserror::Error;

/// Errors from the underlying blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object does not exist.
    #[error("Object not found: {container}/{key}")]
    NotFound {
        /// Container the lookup ran against.
        container: String,
        /// Object key.
        key: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure, with the vendor error attached when available.
    #[error("Backend error: {message}")]
    Backend {
        /// Human-readable description of what failed.
        message: String,
        /// Underlying vendor/SDK error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Build a `NotFound` error for a container/key pair.
    pub fn not_found(container: impl Into<String>, key: impl Into<String>) -> Self {
        StorageError::NotFound {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Build a `Backend` error from a bare message.
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// True if this error means the target object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
