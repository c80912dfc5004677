//! File handles: lazy metadata, streams, whole-content helpers, optimistic
//! concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use blobfs_storage::{BlobReadStream, PutOptions};

use crate::dir::VirtualDirectory;
use crate::error::VfsError;
use crate::fs::VfsContext;
use crate::meta::{now_epoch_secs, FileState, CUSTOM_CONTENT_HASH_KEY, CUSTOM_CREATED_KEY};
use crate::options::WriteOptions;
use crate::path::VfsPath;

/// Handle for a backend-managed multipart upload.
///
/// Reserved for backend-specific extensions; the portable layer never
/// constructs one.
#[derive(Debug)]
pub struct MultipartUpload {
    _reserved: (),
}

/// Handle over one object in the store.
///
/// Construction performs no I/O; metadata loads on first access or explicit
/// [`refresh`](Self::refresh). Deleting the backing object does not destroy
/// the handle - it becomes a stale reference.
#[derive(Clone)]
pub struct VirtualFile {
    ctx: Arc<VfsContext>,
    path: VfsPath,
    state: Arc<Mutex<Option<Arc<FileState>>>>,
}

impl VirtualFile {
    pub(crate) fn new(ctx: Arc<VfsContext>, path: VfsPath) -> Self {
        Self {
            ctx,
            path,
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Build a handle pre-seeded with a listing snapshot (size/timestamps,
    /// no custom metadata yet).
    pub(crate) fn with_state(ctx: Arc<VfsContext>, path: VfsPath, state: Arc<FileState>) -> Self {
        Self {
            ctx,
            path,
            state: Arc::new(Mutex::new(Some(state))),
        }
    }

    /// Path of this file.
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// File name (final path segment).
    pub fn name(&self) -> &str {
        self.path.file_name()
    }

    /// Handle for the containing directory.
    pub fn parent(&self) -> VirtualDirectory {
        VirtualDirectory::new(self.ctx.clone(), self.path.parent())
    }

    /// Whether a backing object currently exists (cached).
    pub async fn exists(&self) -> Result<bool, VfsError> {
        self.ctx
            .meta
            .file_exists(self.ctx.container(), self.path.to_blob_key())
            .await
            .map_err(|e| VfsError::operation("check object existence", e))
    }

    /// Re-fetch metadata and custom metadata from the backend, repopulating
    /// the cache.
    ///
    /// # Errors
    /// `NotFound` if the backing object no longer exists.
    pub async fn refresh(&self) -> Result<(), VfsError> {
        self.refresh_state().await?;
        Ok(())
    }

    async fn refresh_state(&self) -> Result<Arc<FileState>, VfsError> {
        let refreshed = self
            .ctx
            .meta
            .refresh(self.ctx.container(), self.path.to_blob_key())
            .await
            .map_err(|e| VfsError::operation("load object metadata", e))?;
        match refreshed {
            Some(state) => {
                *self.state.lock() = Some(state.clone());
                Ok(state)
            }
            None => {
                *self.state.lock() = None;
                Err(VfsError::NotFound(self.path.clone()))
            }
        }
    }

    /// Load metadata if the handle has none yet. Idempotent.
    pub(crate) async fn ensure_loaded(&self) -> Result<Arc<FileState>, VfsError> {
        let cached: Option<Arc<FileState>> = self.state.lock().clone();
        if let Some(state) = cached {
            return Ok(state);
        }
        let loaded = self
            .ctx
            .meta
            .file_state(self.ctx.container(), self.path.to_blob_key())
            .await
            .map_err(|e| VfsError::operation("load object metadata", e))?;
        match loaded {
            Some(state) => {
                *self.state.lock() = Some(state.clone());
                Ok(state)
            }
            None => Err(VfsError::NotFound(self.path.clone())),
        }
    }

    /// Like [`ensure_loaded`](Self::ensure_loaded), but guarantees custom
    /// metadata is present (listing snapshots don't carry it).
    pub(crate) async fn ensure_fully_loaded(&self) -> Result<Arc<FileState>, VfsError> {
        let state: Arc<FileState> = self.ensure_loaded().await?;
        if state.is_fully_loaded() {
            return Ok(state);
        }
        self.refresh_state().await
    }

    /// Size in bytes.
    pub async fn size(&self) -> Result<u64, VfsError> {
        Ok(self.ensure_loaded().await?.size)
    }

    /// Content type, when the backend reports one.
    pub async fn content_type(&self) -> Result<Option<String>, VfsError> {
        Ok(self.ensure_loaded().await?.content_type.clone())
    }

    /// Current version tag.
    pub async fn etag(&self) -> Result<Option<String>, VfsError> {
        Ok(self.ensure_loaded().await?.etag.clone())
    }

    /// Last modified time.
    pub async fn last_modified(&self) -> Result<Option<SystemTime>, VfsError> {
        Ok(self.ensure_loaded().await?.last_modified)
    }

    /// Creation time (from the VFS stamp, falling back to last-modified).
    pub async fn created(&self) -> Result<Option<SystemTime>, VfsError> {
        Ok(self.ensure_fully_loaded().await?.created())
    }

    /// SHA-256 content hash, when a whole-content write recorded one.
    pub async fn content_hash(&self) -> Result<Option<String>, VfsError> {
        Ok(self
            .ensure_fully_loaded()
            .await?
            .content_hash()
            .map(str::to_string))
    }

    /// Custom metadata attached to the object.
    pub async fn custom_metadata(&self) -> Result<HashMap<String, String>, VfsError> {
        Ok(self
            .ensure_fully_loaded()
            .await?
            .custom
            .clone()
            .unwrap_or_default())
    }

    /// Open a readable stream over the object's content.
    pub async fn open_read(&self) -> Result<BlobReadStream, VfsError> {
        self.ctx
            .storage
            .get_stream(self.ctx.container(), self.path.to_blob_key())
            .await
            .map_err(|e| VfsError::from_storage(&self.path, "open read stream", e))
    }

    /// Read up to `count` bytes starting at `offset`.
    ///
    /// # Returns
    /// Exactly the bytes available in the range - fewer than `count` when
    /// the object ends early.
    pub async fn read_range(&self, offset: u64, count: u64) -> Result<Bytes, VfsError> {
        self.ctx
            .storage
            .get_range(self.ctx.container(), self.path.to_blob_key(), offset, count)
            .await
            .map_err(|e| VfsError::from_storage(&self.path, "read range", e))
    }

    /// Open the file for writing.
    ///
    /// Enforces the overwrite flag, then - when `expected_etag` is supplied -
    /// refreshes and compares the version tag, failing with a `Concurrency`
    /// error before any byte is staged. The returned writer buffers content;
    /// nothing reaches storage until [`FileWriter::close`].
    pub async fn open_write(&self, options: WriteOptions) -> Result<FileWriter, VfsError> {
        let container: &str = self.ctx.container();
        let key: &str = self.path.to_blob_key();

        let current: Option<Arc<FileState>> = if options.expected_etag.is_some() {
            self.ctx
                .meta
                .refresh(container, key)
                .await
                .map_err(|e| VfsError::operation("load object metadata", e))?
        } else {
            self.ctx
                .meta
                .file_state(container, key)
                .await
                .map_err(|e| VfsError::operation("load object metadata", e))?
        };
        *self.state.lock() = current.clone();

        if !options.overwrite && current.is_some() {
            return Err(VfsError::AlreadyExists(self.path.clone()));
        }
        if let Some(expected) = &options.expected_etag {
            let actual: Option<String> = current.as_ref().and_then(|s| s.etag.clone());
            if actual.as_deref() != Some(expected.as_str()) {
                return Err(VfsError::Concurrency {
                    path: self.path.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        // Preserve the creation stamp across overwrites
        let created: Option<String> = current
            .as_ref()
            .and_then(|s| s.custom.as_ref())
            .and_then(|m| m.get(CUSTOM_CREATED_KEY).cloned());

        Ok(FileWriter {
            ctx: self.ctx.clone(),
            path: self.path.clone(),
            shared_state: self.state.clone(),
            buffer: BytesMut::new(),
            hasher: Sha256::new(),
            content_type: options.content_type,
            metadata: options.metadata.unwrap_or_default(),
            created,
        })
    }

    /// Read the whole content into memory.
    pub async fn read_all_bytes(&self) -> Result<Vec<u8>, VfsError> {
        let mut reader: BlobReadStream = self.open_read().await?;
        let mut data: Vec<u8> = Vec::new();
        reader.read_to_end(&mut data).await?;
        Ok(data)
    }

    /// Read the whole content as UTF-8 text.
    pub async fn read_all_text(&self) -> Result<String, VfsError> {
        Ok(String::from_utf8(self.read_all_bytes().await?)?)
    }

    /// Replace the whole content.
    pub async fn write_all_bytes(&self, data: impl AsRef<[u8]>) -> Result<(), VfsError> {
        let mut writer: FileWriter = self.open_write(WriteOptions::default()).await?;
        writer.write(data.as_ref()).await?;
        writer.close().await
    }

    /// Replace the whole content with UTF-8 text.
    pub async fn write_all_text(&self, text: impl AsRef<str>) -> Result<(), VfsError> {
        self.write_all_bytes(text.as_ref().as_bytes()).await
    }

    /// Replace the custom metadata on the object.
    ///
    /// Same version-tag precondition pattern as writes; the VFS stamps
    /// (creation time, content hash) are carried over unless the new map
    /// overrides them.
    pub async fn set_custom_metadata(
        &self,
        metadata: HashMap<String, String>,
        expected_etag: Option<String>,
    ) -> Result<(), VfsError> {
        let container: &str = self.ctx.container();
        let key: &str = self.path.to_blob_key();

        let current: Arc<FileState> = if expected_etag.is_some() {
            self.refresh_state().await?
        } else {
            self.ensure_fully_loaded().await?
        };
        if let Some(expected) = &expected_etag {
            if current.etag.as_deref() != Some(expected.as_str()) {
                return Err(VfsError::Concurrency {
                    path: self.path.clone(),
                    expected: expected.clone(),
                    actual: current.etag.clone(),
                });
            }
        }

        let mut merged: HashMap<String, String> = metadata;
        if let Some(custom) = &current.custom {
            for stamp in [CUSTOM_CREATED_KEY, CUSTOM_CONTENT_HASH_KEY] {
                if !merged.contains_key(stamp) {
                    if let Some(value) = custom.get(stamp) {
                        merged.insert(stamp.to_string(), value.clone());
                    }
                }
            }
        }

        let updated = self
            .ctx
            .storage
            .set_metadata(container, key, merged)
            .await
            .map_err(|e| VfsError::from_storage(&self.path, "set object metadata", e))?;

        self.ctx.meta.invalidate(container, key).await;
        let state: Arc<FileState> = Arc::new(FileState::from_metadata(updated));
        self.ctx.meta.record(container, key, state.clone()).await;
        *self.state.lock() = Some(state);
        Ok(())
    }

    /// Begin a multipart upload.
    ///
    /// Not available in the portable layer - backends with native multipart
    /// support expose their own entry points.
    pub async fn start_multipart_upload(&self) -> Result<MultipartUpload, VfsError> {
        Err(VfsError::NotSupported(
            "multipart upload is backend-specific and not part of the portable VFS layer",
        ))
    }

    /// Delete the backing object.
    ///
    /// # Returns
    /// `false` when there was nothing to delete. The handle stays usable as
    /// a stale reference either way.
    pub async fn delete(&self) -> Result<bool, VfsError> {
        let container: &str = self.ctx.container();
        let key: &str = self.path.to_blob_key();
        let deleted: bool = self
            .ctx
            .storage
            .delete(container, key)
            .await
            .map_err(|e| VfsError::operation("delete object", e))?;
        if deleted {
            self.ctx.meta.invalidate(container, key).await;
            *self.state.lock() = None;
        }
        Ok(deleted)
    }

    /// Seed the handle with a fresh observed state.
    pub(crate) fn seed_state(&self, state: Arc<FileState>) {
        *self.state.lock() = Some(state);
    }
}

/// Staged write to one object.
///
/// Bytes accumulate in memory; [`close`](Self::close) is the single point at
/// which they become durable. Dropping the writer without closing discards
/// the staged content.
pub struct FileWriter {
    ctx: Arc<VfsContext>,
    path: VfsPath,
    shared_state: Arc<Mutex<Option<Arc<FileState>>>>,
    buffer: BytesMut,
    hasher: Sha256,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
    created: Option<String>,
}

impl FileWriter {
    /// Stage more content.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), VfsError> {
        self.buffer.extend_from_slice(data);
        self.hasher.update(data);
        Ok(())
    }

    /// Bytes staged so far.
    pub fn staged_len(&self) -> usize {
        self.buffer.len()
    }

    /// Path this writer targets.
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// Upload the staged content and finalize the write.
    ///
    /// Stamps the SHA-256 content hash and creation time into custom
    /// metadata, invalidates cached entries for the path, and refreshes the
    /// originating handle.
    pub async fn close(self) -> Result<(), VfsError> {
        let container: String = self.ctx.container().to_string();
        let key: String = self.path.to_blob_key().to_string();

        let mut metadata: HashMap<String, String> = self.metadata;
        metadata.insert(
            CUSTOM_CONTENT_HASH_KEY.to_string(),
            hex::encode(self.hasher.finalize()),
        );
        metadata.insert(
            CUSTOM_CREATED_KEY.to_string(),
            self.created
                .unwrap_or_else(|| now_epoch_secs().to_string()),
        );

        let put_options = PutOptions {
            content_type: self.content_type,
            metadata: Some(metadata),
        };
        let stored = self
            .ctx
            .storage
            .put(&container, &key, self.buffer.freeze(), put_options)
            .await
            .map_err(|e| VfsError::operation("upload object", e))?;

        self.ctx.meta.invalidate(&container, &key).await;
        // A cached "directory missing" answer for the parent is stale now.
        self.ctx
            .meta
            .cache()
            .invalidate_dir(&container, self.path.parent().to_blob_key())
            .await;

        let state: Arc<FileState> = Arc::new(FileState::from_metadata(stored));
        tracing::debug!("Wrote {} ({} bytes committed)", self.path, state.size);
        self.ctx.meta.record(&container, &key, state.clone()).await;
        *self.shared_state.lock() = Some(state);
        Ok(())
    }
}
