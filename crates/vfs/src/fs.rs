//! The filesystem facade: handle creation, existence, deletion, move/copy.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio::io::AsyncReadExt;

use blobfs_storage::{BlobItem, BlobStorage, PutOptions};

use crate::cache::{CacheEntry, CacheKind, MetadataCache};
use crate::dir::{prefix_of, VirtualDirectory};
use crate::error::VfsError;
use crate::file::VirtualFile;
use crate::meta::MetadataManager;
use crate::node::VfsEntry;
use crate::options::{
    CopyOptions, CopyProgress, CopyProgressObserver, CopyResult, DeleteDirectoryResult,
    ListOptions, VfsOptions, WriteOptions,
};
use crate::path::VfsPath;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Shared state behind every handle the facade creates.
pub(crate) struct VfsContext {
    pub(crate) storage: Arc<dyn BlobStorage>,
    pub(crate) meta: MetadataManager,
    pub(crate) options: VfsOptions,
}

impl VfsContext {
    pub(crate) fn container(&self) -> &str {
        &self.options.default_container
    }

    /// True iff at least one object exists under the path's key prefix.
    /// The listing is short-circuited after the first item; the answer is
    /// cached.
    pub(crate) async fn directory_exists(&self, path: &VfsPath) -> Result<bool, VfsError> {
        let container: &str = self.container();
        let key: &str = path.to_blob_key();

        if let Some(CacheEntry::Exists(exists)) = self
            .meta
            .cache()
            .get(container, key, CacheKind::DirExists)
            .await
        {
            return Ok(exists);
        }

        let prefix: String = prefix_of(path);
        let exists: bool = {
            let mut items = self.storage.list(container, &prefix);
            match items.next().await {
                Some(Ok(_)) => true,
                Some(Err(e)) => return Err(VfsError::operation("list objects", e)),
                None => false,
            }
        };
        self.meta
            .cache()
            .insert(container, key, CacheKind::DirExists, CacheEntry::Exists(exists))
            .await;
        Ok(exists)
    }

    /// Delete the objects under a directory prefix.
    ///
    /// Non-recursive mode removes only direct children (relative keys with
    /// no further `/`); recursive mode removes everything under the prefix,
    /// marker objects included. Per-object failures accumulate instead of
    /// aborting the sweep.
    pub(crate) async fn delete_directory(
        &self,
        path: &VfsPath,
        recursive: bool,
    ) -> Result<DeleteDirectoryResult, VfsError> {
        let container: String = self.container().to_string();
        let prefix: String = prefix_of(path);
        let mut result = DeleteDirectoryResult::default();

        let mut items = self.storage.list(&container, &prefix);
        while let Some(item) = items.next().await {
            let item: BlobItem =
                item.map_err(|e| VfsError::operation("list objects for delete", e))?;
            let rel: &str = match item.key.strip_prefix(&prefix) {
                Some(rel) => rel,
                None => {
                    tracing::warn!("Skipping listing entry outside prefix: {}", item.key);
                    continue;
                }
            };
            if !recursive && (rel.is_empty() || rel.contains('/')) {
                // Not a direct child (or the directory's own marker)
                continue;
            }

            match self.storage.delete(&container, &item.key).await {
                Ok(true) => {
                    result.deleted += 1;
                    self.meta.invalidate(&container, &item.key).await;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {}", item.key, e);
                    result
                        .errors
                        .push((item.key.clone(), VfsError::operation("delete object", e)));
                }
            }
        }

        self.meta
            .cache()
            .invalidate_dir(&container, path.to_blob_key())
            .await;
        tracing::debug!(
            "Deleted {} objects under {} ({} failures)",
            result.deleted,
            path,
            result.errors.len()
        );
        Ok(result)
    }
}

/// The virtual file system over a flat blob store.
///
/// Owns the configuration, creates file and directory handles, and
/// implements the cross-cutting operations (existence, deletion, move,
/// copy, unified listing). This is the only component that talks to the
/// storage abstraction for path-existence semantics and directory deletion.
#[derive(Clone)]
pub struct VirtualFileSystem {
    ctx: Arc<VfsContext>,
}

impl VirtualFileSystem {
    /// Create a filesystem over `storage` with the given options.
    pub fn new(storage: Arc<dyn BlobStorage>, options: VfsOptions) -> Self {
        let cache = MetadataCache::new(options.enable_cache, options.cache_ttl);
        let meta = MetadataManager::new(storage.clone(), cache);
        Self {
            ctx: Arc::new(VfsContext {
                storage,
                meta,
                options,
            }),
        }
    }

    /// The configuration this filesystem runs with.
    pub fn options(&self) -> &VfsOptions {
        &self.ctx.options
    }

    /// Create a file handle. Performs no I/O; existence is unknown until
    /// checked.
    pub fn get_file(&self, path: VfsPath) -> VirtualFile {
        VirtualFile::new(self.ctx.clone(), path)
    }

    /// Create a directory handle. Performs no I/O.
    pub fn get_directory(&self, path: VfsPath) -> VirtualDirectory {
        VirtualDirectory::new(self.ctx.clone(), path)
    }

    /// The root directory handle.
    pub fn root(&self) -> VirtualDirectory {
        self.get_directory(VfsPath::root())
    }

    /// Whether a file exists at `path` (cached).
    pub async fn file_exists(&self, path: &VfsPath) -> Result<bool, VfsError> {
        self.ctx
            .meta
            .file_exists(self.ctx.container(), path.to_blob_key())
            .await
            .map_err(|e| VfsError::operation("check object existence", e))
    }

    /// Delete the file at `path`.
    ///
    /// # Returns
    /// `false` when storage reports nothing was deleted - not an error.
    pub async fn delete_file(&self, path: &VfsPath) -> Result<bool, VfsError> {
        let container: &str = self.ctx.container();
        let key: &str = path.to_blob_key();
        let deleted: bool = self
            .ctx
            .storage
            .delete(container, key)
            .await
            .map_err(|e| VfsError::operation("delete object", e))?;
        if deleted {
            self.ctx.meta.invalidate(container, key).await;
        }
        Ok(deleted)
    }

    /// Whether a directory exists at `path` (cached; short-circuits on the
    /// first object found under the prefix).
    pub async fn directory_exists(&self, path: &VfsPath) -> Result<bool, VfsError> {
        self.ctx.directory_exists(path).await
    }

    /// Delete the directory at `path`.
    ///
    /// See [`DeleteDirectoryResult`]: per-object failures are accumulated,
    /// and overall success means the error list is empty.
    pub async fn delete_directory(
        &self,
        path: &VfsPath,
        recursive: bool,
    ) -> Result<DeleteDirectoryResult, VfsError> {
        self.ctx.delete_directory(path, recursive).await
    }

    /// Move `src` to `dst`: a copy followed by deletion of the source if it
    /// still exists.
    ///
    /// Not atomic. A failure between the copy and the delete leaves both
    /// copies present; when the copy itself reports per-item errors the
    /// source is kept so nothing is lost.
    pub async fn rename(
        &self,
        src: &VfsPath,
        dst: &VfsPath,
        options: CopyOptions,
    ) -> Result<CopyResult, VfsError> {
        let result: CopyResult = self.copy(src, dst, &options, None).await?;
        if !result.is_success() {
            tracing::warn!(
                "Move {} -> {}: copy reported {} failures, source kept",
                src,
                dst,
                result.errors.len()
            );
            return Ok(result);
        }

        if self.file_exists(src).await? {
            self.delete_file(src).await?;
        } else if self.directory_exists(src).await? {
            let deletion: DeleteDirectoryResult = self.delete_directory(src, true).await?;
            if !deletion.is_success() {
                tracing::warn!(
                    "Move {} -> {}: {} source objects could not be deleted",
                    src,
                    dst,
                    deletion.errors.len()
                );
            }
        }
        Ok(result)
    }

    /// Copy `src` to `dst`, dispatching on whether the source is a file or
    /// a directory. Directory copies require `options.recursive`.
    pub async fn copy(
        &self,
        src: &VfsPath,
        dst: &VfsPath,
        options: &CopyOptions,
        observer: Option<&dyn CopyProgressObserver>,
    ) -> Result<CopyResult, VfsError> {
        if self.file_exists(src).await? {
            self.copy_file(src, dst, options, observer).await
        } else if self.directory_exists(src).await? {
            if !options.recursive {
                return Err(VfsError::invalid_operation(format!(
                    "{} is a directory; directory copies require CopyOptions.recursive",
                    src
                )));
            }
            self.copy_directory(src, dst, options, observer).await
        } else {
            Err(VfsError::NotFound(src.clone()))
        }
    }

    /// Resolve a path to whichever node kind backs it, file first.
    pub async fn get_entry(&self, path: &VfsPath) -> Result<Option<VfsEntry>, VfsError> {
        if self.file_exists(path).await? {
            Ok(Some(VfsEntry::File(self.get_file(path.clone()))))
        } else if self.directory_exists(path).await? {
            Ok(Some(VfsEntry::Directory(self.get_directory(path.clone()))))
        } else {
            Ok(None)
        }
    }

    /// Enumerate the entries under `path`, honoring the include flags in
    /// `options`.
    pub fn list(
        &self,
        path: &VfsPath,
        options: ListOptions,
    ) -> BoxStream<'static, Result<VfsEntry, VfsError>> {
        self.get_directory(path.clone()).entries(options)
    }

    async fn copy_file(
        &self,
        src: &VfsPath,
        dst: &VfsPath,
        options: &CopyOptions,
        observer: Option<&dyn CopyProgressObserver>,
    ) -> Result<CopyResult, VfsError> {
        let src_file: VirtualFile = self.get_file(src.clone());
        let total_bytes: u64 = src_file.size().await?;

        report(
            observer,
            &CopyProgress {
                files_copied: 0,
                total_files: 1,
                bytes_copied: 0,
                total_bytes,
                current: Some(src.clone()),
            },
        )?;

        let bytes_copied: u64 = self.copy_object(src, dst, options).await?;

        report(
            observer,
            &CopyProgress {
                files_copied: 1,
                total_files: 1,
                bytes_copied,
                total_bytes,
                current: None,
            },
        )?;

        Ok(CopyResult {
            files_copied: 1,
            bytes_copied,
            skipped: 0,
            errors: Vec::new(),
        })
    }

    /// Two-pass directory copy: the first pass walks the prefix to compute
    /// progress denominators, the second performs the copies, skipping
    /// existing destinations when overwrite is off and accumulating
    /// per-item errors.
    async fn copy_directory(
        &self,
        src: &VfsPath,
        dst: &VfsPath,
        options: &CopyOptions,
        observer: Option<&dyn CopyProgressObserver>,
    ) -> Result<CopyResult, VfsError> {
        let container: String = self.ctx.container().to_string();
        let src_prefix: String = prefix_of(src);

        // First pass: totals for the progress denominators
        let mut rel_keys: Vec<String> = Vec::new();
        let mut total_files: u64 = 0;
        let mut total_bytes: u64 = 0;
        {
            let mut items = self.ctx.storage.list(&container, &src_prefix);
            while let Some(item) = items.next().await {
                let item: BlobItem =
                    item.map_err(|e| VfsError::operation("list objects for copy", e))?;
                let rel: &str = match item.key.strip_prefix(&src_prefix) {
                    Some(rel) => rel,
                    None => continue,
                };
                if !rel.is_empty() && !rel.ends_with('/') {
                    total_files += 1;
                    total_bytes += item.size;
                }
                rel_keys.push(rel.to_string());
            }
        }

        report(
            observer,
            &CopyProgress {
                files_copied: 0,
                total_files,
                bytes_copied: 0,
                total_bytes,
                current: None,
            },
        )?;

        // Second pass: copy
        let mut result = CopyResult::default();
        for rel in rel_keys {
            if rel.is_empty() || rel.ends_with('/') {
                if let Err(err) = self
                    .copy_marker(&container, src, dst, &rel, options.overwrite)
                    .await
                {
                    result.errors.push((format!("{}{}", src_prefix, rel), err));
                }
                continue;
            }

            let src_path: VfsPath = match src.join(&rel) {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!("Skipping malformed key {}{}: {}", src_prefix, rel, err);
                    continue;
                }
            };
            let dst_path: VfsPath = match dst.join(&rel) {
                Ok(path) => path,
                Err(err) => {
                    result
                        .errors
                        .push((format!("{}{}", src_prefix, rel), VfsError::Path(err)));
                    continue;
                }
            };

            if !options.overwrite && self.file_exists(&dst_path).await? {
                result.skipped += 1;
                continue;
            }

            match self.copy_object(&src_path, &dst_path, options).await {
                Ok(bytes) => {
                    result.files_copied += 1;
                    result.bytes_copied += bytes;
                }
                Err(err) => {
                    tracing::warn!("Failed to copy {}: {}", src_path, err);
                    result
                        .errors
                        .push((format!("{}{}", src_prefix, rel), err));
                }
            }

            report(
                observer,
                &CopyProgress {
                    files_copied: result.files_copied,
                    total_files,
                    bytes_copied: result.bytes_copied,
                    total_bytes,
                    current: Some(src_path),
                },
            )?;
        }
        Ok(result)
    }

    /// Stream-copy one object, preserving content type and (optionally)
    /// custom metadata. The destination writer enforces the overwrite flag.
    async fn copy_object(
        &self,
        src: &VfsPath,
        dst: &VfsPath,
        options: &CopyOptions,
    ) -> Result<u64, VfsError> {
        let src_file: VirtualFile = self.get_file(src.clone());
        let state = if options.copy_metadata {
            src_file.ensure_fully_loaded().await?
        } else {
            src_file.ensure_loaded().await?
        };

        let mut write_options = WriteOptions::default().with_overwrite(options.overwrite);
        if let Some(content_type) = &state.content_type {
            write_options = write_options.with_content_type(content_type.clone());
        }
        if options.copy_metadata {
            if let Some(custom) = &state.custom {
                write_options = write_options.with_metadata(custom.clone());
            }
        }

        let dst_file: VirtualFile = self.get_file(dst.clone());
        let mut writer = dst_file.open_write(write_options).await?;
        let mut reader = src_file.open_read().await?;

        let mut buffer: Vec<u8> = vec![0u8; COPY_BUFFER_SIZE];
        let mut copied: u64 = 0;
        loop {
            let n: usize = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            writer.write(&buffer[..n]).await?;
            copied += n as u64;
        }
        writer.close().await?;
        Ok(copied)
    }

    /// Copy a directory-marker object verbatim (keys ending in `/`, or the
    /// source directory's own marker when `rel` is empty).
    async fn copy_marker(
        &self,
        container: &str,
        src: &VfsPath,
        dst: &VfsPath,
        rel: &str,
        overwrite: bool,
    ) -> Result<(), VfsError> {
        let dst_base: &str = dst.to_blob_key();
        let dst_key: String = if rel.is_empty() {
            if dst_base.is_empty() {
                // No marker concept for the root
                return Ok(());
            }
            format!("{}/", dst_base)
        } else if dst_base.is_empty() {
            rel.to_string()
        } else {
            format!("{}/{}", dst_base, rel)
        };
        let src_key: String = format!("{}{}", prefix_of(src), rel);

        if !overwrite
            && self
                .ctx
                .storage
                .exists(container, &dst_key)
                .await
                .map_err(|e| VfsError::operation("check marker existence", e))?
        {
            return Ok(());
        }

        let head = self
            .ctx
            .storage
            .head(container, &src_key)
            .await
            .map_err(|e| VfsError::operation("load marker metadata", e))?;
        let put_options = PutOptions {
            content_type: head.and_then(|m| m.content_type),
            metadata: None,
        };
        self.ctx
            .storage
            .put(container, &dst_key, bytes::Bytes::new(), put_options)
            .await
            .map_err(|e| VfsError::operation("copy directory marker", e))?;
        Ok(())
    }
}

fn report(
    observer: Option<&dyn CopyProgressObserver>,
    progress: &CopyProgress,
) -> Result<(), VfsError> {
    match observer {
        Some(observer) if !observer.on_progress(progress) => Err(VfsError::Cancelled),
        _ => Ok(()),
    }
}
