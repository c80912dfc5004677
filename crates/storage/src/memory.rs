//! In-memory blob storage for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::StorageError;
use crate::traits::{BlobItem, BlobMetadata, BlobReadStream, BlobStorage, PutOptions};

/// One stored object.
#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
    last_modified: i64,
    etag: String,
}

/// In-memory [`BlobStorage`] implementation.
///
/// Stores all data in memory, no network I/O. Listings are returned in key
/// order so tests are deterministic; callers of the trait must not rely on
/// that. Supports fault injection so error-accumulation paths can be
/// exercised.
#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    /// Objects by (container, key).
    blobs: RwLock<HashMap<(String, String), StoredBlob>>,
    /// Keys whose next mutation fails.
    poisoned: RwLock<HashSet<(String, String)>>,
    /// Version tag sequence.
    next_etag: AtomicU64,
}

impl MemoryBlobStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future `put`/`delete` calls against `key` fail with a backend
    /// error, until [`clear_failures`](Self::clear_failures) is called.
    pub fn inject_failure(&self, container: &str, key: &str) {
        self.poisoned
            .write()
            .unwrap()
            .insert((container.to_string(), key.to_string()));
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.poisoned.write().unwrap().clear();
    }

    /// Number of stored objects across all containers.
    pub fn object_count(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    fn next_etag(&self) -> String {
        let seq: u64 = self.next_etag.fetch_add(1, Ordering::SeqCst);
        format!("{:016x}", seq)
    }

    fn check_poisoned(&self, container: &str, key: &str) -> Result<(), StorageError> {
        let poisoned = self.poisoned.read().unwrap();
        if poisoned.contains(&(container.to_string(), key.to_string())) {
            return Err(StorageError::backend(format!(
                "injected failure for {}/{}",
                container, key
            )));
        }
        Ok(())
    }

    fn metadata_of(blob: &StoredBlob) -> BlobMetadata {
        BlobMetadata {
            size: blob.data.len() as u64,
            last_modified: Some(blob.last_modified),
            content_type: blob.content_type.clone(),
            etag: Some(blob.etag.clone()),
            metadata: blob.metadata.clone(),
        }
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    fn list(&self, container: &str, prefix: &str) -> BoxStream<'_, Result<BlobItem, StorageError>> {
        let blobs = self.blobs.read().unwrap();
        let mut items: Vec<BlobItem> = blobs
            .iter()
            .filter(|((c, k), _)| c == container && k.starts_with(prefix))
            .map(|((_, k), blob)| BlobItem {
                key: k.clone(),
                size: blob.data.len() as u64,
                last_modified: Some(blob.last_modified),
                etag: Some(blob.etag.clone()),
                content_type: blob.content_type.clone(),
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        stream::iter(items.into_iter().map(Ok)).boxed()
    }

    async fn head(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<BlobMetadata>, StorageError> {
        let blobs = self.blobs.read().unwrap();
        Ok(blobs
            .get(&(container.to_string(), key.to_string()))
            .map(Self::metadata_of))
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<BlobMetadata, StorageError> {
        self.check_poisoned(container, key)?;
        let blob = StoredBlob {
            data,
            content_type: options.content_type,
            metadata: options.metadata.unwrap_or_default(),
            last_modified: now_epoch_secs(),
            etag: self.next_etag(),
        };
        let meta: BlobMetadata = Self::metadata_of(&blob);
        self.blobs
            .write()
            .unwrap()
            .insert((container.to_string(), key.to_string()), blob);
        Ok(meta)
    }

    async fn get(&self, container: &str, key: &str) -> Result<Bytes, StorageError> {
        let blobs = self.blobs.read().unwrap();
        blobs
            .get(&(container.to_string(), key.to_string()))
            .map(|blob| blob.data.clone())
            .ok_or_else(|| StorageError::not_found(container, key))
    }

    async fn get_stream(
        &self,
        container: &str,
        key: &str,
    ) -> Result<BlobReadStream, StorageError> {
        let data: Bytes = self.get(container, key).await?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn get_range(
        &self,
        container: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Bytes, StorageError> {
        let data: Bytes = self.get(container, key).await?;
        let start: usize = (offset as usize).min(data.len());
        let end: usize = ((offset + length) as usize).min(data.len());
        Ok(data.slice(start..end))
    }

    async fn delete(&self, container: &str, key: &str) -> Result<bool, StorageError> {
        self.check_poisoned(container, key)?;
        let removed = self
            .blobs
            .write()
            .unwrap()
            .remove(&(container.to_string(), key.to_string()));
        Ok(removed.is_some())
    }

    async fn exists(&self, container: &str, key: &str) -> Result<bool, StorageError> {
        let blobs = self.blobs.read().unwrap();
        Ok(blobs.contains_key(&(container.to_string(), key.to_string())))
    }

    async fn set_metadata(
        &self,
        container: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> Result<BlobMetadata, StorageError> {
        self.check_poisoned(container, key)?;
        let mut blobs = self.blobs.write().unwrap();
        let blob: &mut StoredBlob = blobs
            .get_mut(&(container.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::not_found(container, key))?;
        blob.metadata = metadata;
        blob.last_modified = now_epoch_secs();
        blob.etag = self.next_etag();
        Ok(Self::metadata_of(blob))
    }
}
