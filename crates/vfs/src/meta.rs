//! Metadata manager: resolves blob attributes and custom metadata through
//! the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use blobfs_storage::{BlobItem, BlobMetadata, BlobStorage, StorageError};

use crate::cache::{CacheEntry, CacheKind, MetadataCache};

/// Custom-metadata key holding the creation timestamp (epoch seconds),
/// stamped by VFS writes.
pub const CUSTOM_CREATED_KEY: &str = "x-vfs-created";

/// Custom-metadata key holding the SHA-256 content hash, stamped by
/// whole-content writes.
pub const CUSTOM_CONTENT_HASH_KEY: &str = "x-vfs-content-hash";

/// Loaded attributes of one backing object.
///
/// `custom` is `None` on snapshots seeded from listings, which carry sizes
/// and timestamps but not user metadata; a refresh fills it in.
#[derive(Debug, Clone)]
pub struct FileState {
    /// Size in bytes.
    pub size: u64,
    /// Content type, when the backend reports one.
    pub content_type: Option<String>,
    /// Version tag.
    pub etag: Option<String>,
    /// Last modified time.
    pub last_modified: Option<SystemTime>,
    /// Custom metadata; `None` until fetched via HEAD.
    pub custom: Option<HashMap<String, String>>,
}

impl FileState {
    /// Build a full state from a HEAD result.
    pub fn from_metadata(meta: BlobMetadata) -> Self {
        Self {
            size: meta.size,
            content_type: meta.content_type,
            etag: meta.etag,
            last_modified: meta.last_modified.map(epoch_secs_to_system_time),
            custom: Some(meta.metadata),
        }
    }

    /// Build a partial state from a listing row.
    pub fn from_item(item: &BlobItem) -> Self {
        Self {
            size: item.size,
            content_type: item.content_type.clone(),
            etag: item.etag.clone(),
            last_modified: item.last_modified.map(epoch_secs_to_system_time),
            custom: None,
        }
    }

    /// True when custom metadata has been fetched.
    pub fn is_fully_loaded(&self) -> bool {
        self.custom.is_some()
    }

    /// Creation time from the `x-vfs-created` stamp, falling back to the
    /// last-modified time.
    pub fn created(&self) -> Option<SystemTime> {
        self.custom
            .as_ref()
            .and_then(|m| m.get(CUSTOM_CREATED_KEY))
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(epoch_secs_to_system_time)
            .or(self.last_modified)
    }

    /// SHA-256 content hash, when a whole-content write recorded one.
    pub fn content_hash(&self) -> Option<&str> {
        self.custom
            .as_ref()
            .and_then(|m| m.get(CUSTOM_CONTENT_HASH_KEY))
            .map(String::as_str)
    }
}

/// Convert epoch seconds to SystemTime.
pub(crate) fn epoch_secs_to_system_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs((-secs) as u64)
    }
}

/// Current time as epoch seconds.
pub(crate) fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Resolves blob existence/attributes and custom metadata for storage keys,
/// consulting the TTL cache before the backend.
#[derive(Clone)]
pub struct MetadataManager {
    storage: Arc<dyn BlobStorage>,
    cache: MetadataCache,
}

impl MetadataManager {
    /// Create a manager over a storage backend and cache.
    pub fn new(storage: Arc<dyn BlobStorage>, cache: MetadataCache) -> Self {
        Self { storage, cache }
    }

    /// The cache this manager populates.
    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Resolve the state of a key, cache first.
    ///
    /// # Returns
    /// `None` when no backing object exists; both hits and misses are cached
    /// under the configured TTL.
    pub async fn file_state(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Arc<FileState>>, StorageError> {
        // Check cache first
        match self.cache.get(container, key, CacheKind::Metadata).await {
            Some(CacheEntry::Metadata(state)) => return Ok(Some(state)),
            _ => {}
        }
        if let Some(CacheEntry::Exists(false)) =
            self.cache.get(container, key, CacheKind::FileExists).await
        {
            return Ok(None);
        }

        self.refresh(container, key).await
    }

    /// Resolve the state of a key directly from the backend, repopulating
    /// the cache with whatever it reports.
    pub async fn refresh(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Arc<FileState>>, StorageError> {
        tracing::debug!("Refreshing metadata for {}/{}", container, key);
        match self.storage.head(container, key).await? {
            Some(meta) => {
                let state: Arc<FileState> = Arc::new(FileState::from_metadata(meta));
                self.record(container, key, state.clone()).await;
                Ok(Some(state))
            }
            None => {
                self.cache
                    .insert(container, key, CacheKind::FileExists, CacheEntry::Exists(false))
                    .await;
                Ok(None)
            }
        }
    }

    /// Cached existence check for a key.
    pub async fn file_exists(&self, container: &str, key: &str) -> Result<bool, StorageError> {
        if let Some(CacheEntry::Exists(exists)) =
            self.cache.get(container, key, CacheKind::FileExists).await
        {
            return Ok(exists);
        }
        Ok(self.file_state(container, key).await?.is_some())
    }

    /// Store a freshly observed state in the cache.
    pub async fn record(&self, container: &str, key: &str, state: Arc<FileState>) {
        self.cache
            .insert(container, key, CacheKind::Metadata, CacheEntry::Metadata(state))
            .await;
        self.cache
            .insert(container, key, CacheKind::FileExists, CacheEntry::Exists(true))
            .await;
    }

    /// Drop all cached entries for a key (called on write/delete/metadata-set).
    pub async fn invalidate(&self, container: &str, key: &str) {
        self.cache.invalidate(container, key).await;
    }
}
