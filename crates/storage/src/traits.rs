//! Storage traits/interfaces for flat blob-store operations.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::error::StorageError;

/// Readable byte stream returned by [`BlobStorage::get_stream`].
pub type BlobReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Information about one object from a prefix listing.
#[derive(Debug, Clone)]
pub struct BlobItem {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// Version tag, when the backend reports one.
    pub etag: Option<String>,
    /// Content type, when the backend reports one.
    pub content_type: Option<String>,
}

/// Extended object metadata from HEAD operations.
#[derive(Debug, Clone, Default)]
pub struct BlobMetadata {
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// Content type.
    pub content_type: Option<String>,
    /// Version tag, when the backend reports one.
    pub etag: Option<String>,
    /// User-defined metadata attached to the object.
    pub metadata: HashMap<String, String>,
}

/// Options for [`BlobStorage::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Content type to record on the object.
    pub content_type: Option<String>,
    /// User-defined metadata to attach to the object.
    pub metadata: Option<HashMap<String, String>>,
}

impl PutOptions {
    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the user metadata map.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Low-level blob operations - implemented by each backend.
///
/// The store is flat: it understands string keys and prefix queries, nothing
/// else. Hierarchy, caching and concurrency control live above this trait.
/// Backends own their retry policy; no method here retries.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stream metadata for every object whose key starts with `prefix`.
    ///
    /// Ordering is backend-defined; callers must not rely on it.
    fn list(&self, container: &str, prefix: &str) -> BoxStream<'_, Result<BlobItem, StorageError>>;

    /// Fetch object metadata.
    ///
    /// # Returns
    /// `None` if the object doesn't exist - absence is not an error here.
    async fn head(&self, container: &str, key: &str)
        -> Result<Option<BlobMetadata>, StorageError>;

    /// Upload bytes, replacing any existing object at `key`.
    ///
    /// # Returns
    /// Metadata of the stored object, including its new version tag.
    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<BlobMetadata, StorageError>;

    /// Download the whole object.
    async fn get(&self, container: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Open a readable stream over the object.
    async fn get_stream(&self, container: &str, key: &str)
        -> Result<BlobReadStream, StorageError>;

    /// Download a byte range.
    ///
    /// # Returns
    /// The available bytes in `[offset, offset + length)` - right-sized when
    /// the range extends past the end of the object.
    async fn get_range(
        &self,
        container: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Bytes, StorageError>;

    /// Delete an object.
    ///
    /// # Returns
    /// `false` when there was nothing to delete.
    async fn delete(&self, container: &str, key: &str) -> Result<bool, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, container: &str, key: &str) -> Result<bool, StorageError>;

    /// Replace the user metadata on an existing object without rewriting its
    /// content (copy-to-self on backends that have no dedicated call).
    async fn set_metadata(
        &self,
        container: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> Result<BlobMetadata, StorageError>;
}
