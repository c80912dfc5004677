//! Error types for VFS operations.

use thiserror::Error;

use blobfs_storage::StorageError;

use crate::path::{VfsPath, VfsPathError};

/// Errors that can occur during VFS operations.
///
/// Expected conditions (not-found, already-exists, concurrency) are distinct
/// variants so callers can branch without string matching. Backend failures
/// unrelated to those are rewrapped as [`OperationFailed`](Self::OperationFailed)
/// at the storage-call site with the original error attached.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Operation targeted a path with no backing object.
    #[error("Not found: {0}")]
    NotFound(VfsPath),

    /// Create/write without overwrite hit an existing object.
    #[error("Already exists: {0}")]
    AlreadyExists(VfsPath),

    /// Version-tag precondition failed.
    #[error("Concurrency conflict on {path}: expected {expected:?}, found {actual:?}")]
    Concurrency {
        /// Path the write targeted.
        path: VfsPath,
        /// Tag the caller expected.
        expected: String,
        /// Tag actually present, if the object still exists.
        actual: Option<String>,
    },

    /// Unexpected backend failure, with context.
    #[error("Operation failed: {context}")]
    OperationFailed {
        /// What was being attempted.
        context: String,
        /// Backend error, when one triggered this.
        #[source]
        source: Option<StorageError>,
    },

    /// Feature intentionally unimplemented in this layer.
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// Operation cancelled by a progress observer.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid path input.
    #[error(transparent)]
    Path(#[from] VfsPathError),

    /// Invalid listing pattern.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// Content is not valid UTF-8.
    #[error("Content is not valid UTF-8")]
    InvalidText(#[from] std::string::FromUtf8Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// Wrap an unexpected backend error with context.
    pub fn operation(context: impl Into<String>, source: StorageError) -> Self {
        VfsError::OperationFailed {
            context: context.into(),
            source: Some(source),
        }
    }

    /// An operation error with no backend cause.
    pub fn invalid_operation(context: impl Into<String>) -> Self {
        VfsError::OperationFailed {
            context: context.into(),
            source: None,
        }
    }

    /// Map a storage error for `path`: `NotFound` stays typed, everything
    /// else becomes `OperationFailed` with `context`.
    pub(crate) fn from_storage(path: &VfsPath, context: &str, err: StorageError) -> Self {
        if err.is_not_found() {
            VfsError::NotFound(path.clone())
        } else {
            VfsError::operation(context, err)
        }
    }
}
