//! Directory handles: prefix-based listing, creation, statistics.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};

use blobfs_storage::{BlobItem, PutOptions};

use crate::error::VfsError;
use crate::file::VirtualFile;
use crate::fs::VfsContext;
use crate::meta::{now_epoch_secs, FileState, CUSTOM_CREATED_KEY};
use crate::node::VfsEntry;
use crate::options::{
    CreateFileOptions, DeleteDirectoryResult, DirectoryStats, DirectoryStrategy, ListOptions,
    DIRECTORY_CONTENT_TYPE, DOT_KEEP_NAME,
};
use crate::path::VfsPath;

/// Key prefix a directory path projects onto (`""` for the root).
pub(crate) fn prefix_of(path: &VfsPath) -> String {
    let key: &str = path.to_blob_key();
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key)
    }
}

fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => &name[pos + 1..],
        _ => "",
    }
}

fn matches(pattern: &Option<glob::Pattern>, name: &str) -> bool {
    pattern.as_ref().map(|p| p.matches(name)).unwrap_or(true)
}

/// Handle over a key prefix.
///
/// A directory has no independent backing object unless the configured
/// [`DirectoryStrategy`] creates a marker; its children are inferred from
/// the keys returned by prefix queries.
#[derive(Clone)]
pub struct VirtualDirectory {
    ctx: Arc<VfsContext>,
    path: VfsPath,
}

impl VirtualDirectory {
    pub(crate) fn new(ctx: Arc<VfsContext>, path: VfsPath) -> Self {
        Self { ctx, path }
    }

    /// Path of this directory.
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// Directory name (final path segment; empty for the root).
    pub fn name(&self) -> &str {
        self.path.file_name()
    }

    /// Handle for the parent directory (the root is its own parent).
    pub fn parent(&self) -> VirtualDirectory {
        VirtualDirectory::new(self.ctx.clone(), self.path.parent())
    }

    /// Whether at least one object exists under this prefix (cached).
    pub async fn exists(&self) -> Result<bool, VfsError> {
        self.ctx.directory_exists(&self.path).await
    }

    /// Drop cached answers about this directory so the next check hits the
    /// backend.
    pub async fn refresh(&self) {
        self.ctx
            .meta
            .cache()
            .invalidate_dir(self.ctx.container(), self.path.to_blob_key())
            .await;
    }

    /// Key of this directory's marker object, when the strategy creates one.
    fn marker_key(&self) -> Option<String> {
        match self.ctx.options.directory_strategy {
            DirectoryStrategy::Virtual => None,
            DirectoryStrategy::ZeroByteMarker => Some(prefix_of(&self.path)),
            DirectoryStrategy::DotKeepFile => {
                Some(format!("{}{}", prefix_of(&self.path), DOT_KEEP_NAME))
            }
        }
    }

    /// Last modified time of the marker object, when one exists.
    ///
    /// Directories under the `Virtual` strategy have no backing object and
    /// therefore no timestamps.
    pub async fn last_modified(&self) -> Result<Option<SystemTime>, VfsError> {
        let Some(marker) = self.marker_key() else {
            return Ok(None);
        };
        let head = self
            .ctx
            .storage
            .head(self.ctx.container(), &marker)
            .await
            .map_err(|e| VfsError::operation("load directory marker", e))?;
        Ok(head.and_then(|m| m.last_modified).map(crate::meta::epoch_secs_to_system_time))
    }

    /// Enumerate the entries under this directory.
    ///
    /// Children are inferred from returned keys: in non-recursive mode a
    /// relative key with a further `/` names a subdirectory (emitted once);
    /// in recursive mode every file is emitted along with each intermediate
    /// directory exactly once, interleaved in discovery order. Entries are
    /// produced lazily; after each page-size batch the producer yields to
    /// the scheduler so the consumer can react without the full listing ever
    /// being materialized. Malformed keys are skipped, not fatal.
    pub fn entries(&self, options: ListOptions) -> BoxStream<'static, Result<VfsEntry, VfsError>> {
        let ctx: Arc<VfsContext> = self.ctx.clone();
        let base: VfsPath = self.path.clone();
        Box::pin(try_stream! {
            let pattern: Option<glob::Pattern> = match &options.pattern {
                Some(raw) => Some(glob::Pattern::new(raw)?),
                None => None,
            };
            let container: String = ctx.options.default_container.clone();
            let prefix: String = prefix_of(&base);
            let page_size: usize = ctx.options.default_page_size;
            let mut seen_dirs: HashSet<String> = HashSet::new();
            let mut emitted: usize = 0;

            let mut items = ctx.storage.list(&container, &prefix);
            while let Some(item) = items.next().await {
                let item: BlobItem =
                    item.map_err(|e| VfsError::operation("list objects", e))?;
                let rel: &str = match item.key.strip_prefix(&prefix) {
                    Some(rel) => rel,
                    None => {
                        tracing::warn!("Skipping listing entry outside prefix: {}", item.key);
                        continue;
                    }
                };
                if rel.is_empty() {
                    // The directory's own marker object
                    continue;
                }

                let mut batch: Vec<VfsEntry> = Vec::new();
                if options.recursive {
                    let mut segments: Vec<&str> = rel.split('/').collect();
                    // Marker keys end in '/', leaving an empty final segment
                    let file_name: &str = segments.pop().unwrap_or("");
                    let mut cumulative = String::new();
                    for segment in &segments {
                        if !cumulative.is_empty() {
                            cumulative.push('/');
                        }
                        cumulative.push_str(segment);
                        if !seen_dirs.insert(cumulative.clone()) {
                            continue;
                        }
                        if options.include_directories && matches(&pattern, segment) {
                            match base.join(&cumulative) {
                                Ok(path) => batch.push(VfsEntry::Directory(
                                    VirtualDirectory::new(ctx.clone(), path),
                                )),
                                Err(err) => {
                                    tracing::warn!("Skipping malformed key {}: {}", item.key, err);
                                }
                            }
                        }
                    }
                    if !file_name.is_empty()
                        && options.include_files
                        && matches(&pattern, file_name)
                    {
                        match base.join(rel) {
                            Ok(path) => {
                                let state: Arc<FileState> = Arc::new(FileState::from_item(&item));
                                batch.push(VfsEntry::File(VirtualFile::with_state(
                                    ctx.clone(),
                                    path,
                                    state,
                                )));
                            }
                            Err(err) => {
                                tracing::warn!("Skipping malformed key {}: {}", item.key, err);
                            }
                        }
                    }
                } else {
                    match rel.find('/') {
                        Some(pos) => {
                            // First segment names an inferred subdirectory
                            let dir_name: &str = &rel[..pos];
                            if !dir_name.is_empty()
                                && seen_dirs.insert(dir_name.to_string())
                                && options.include_directories
                                && matches(&pattern, dir_name)
                            {
                                match base.join(dir_name) {
                                    Ok(path) => batch.push(VfsEntry::Directory(
                                        VirtualDirectory::new(ctx.clone(), path),
                                    )),
                                    Err(err) => {
                                        tracing::warn!(
                                            "Skipping malformed key {}: {}",
                                            item.key,
                                            err
                                        );
                                    }
                                }
                            }
                        }
                        None => {
                            if options.include_files && matches(&pattern, rel) {
                                match base.join(rel) {
                                    Ok(path) => {
                                        let state: Arc<FileState> =
                                            Arc::new(FileState::from_item(&item));
                                        batch.push(VfsEntry::File(VirtualFile::with_state(
                                            ctx.clone(),
                                            path,
                                            state,
                                        )));
                                    }
                                    Err(err) => {
                                        tracing::warn!(
                                            "Skipping malformed key {}: {}",
                                            item.key,
                                            err
                                        );
                                    }
                                }
                            }
                        }
                    }
                }

                for entry in batch {
                    yield entry;
                    emitted += 1;
                    if page_size > 0 && emitted % page_size == 0 {
                        // Cooperative checkpoint: bound the work done before
                        // the consumer can react
                        tokio::task::yield_now().await;
                    }
                }
            }
        })
    }

    /// Enumerate only the files under this directory.
    pub fn files(&self, recursive: bool) -> BoxStream<'static, Result<VirtualFile, VfsError>> {
        self.entries(ListOptions::default().recursive(recursive).files_only())
            .filter_map(|entry| async move {
                match entry {
                    Ok(VfsEntry::File(file)) => Some(Ok(file)),
                    Ok(VfsEntry::Directory(_)) => None,
                    Err(err) => Some(Err(err)),
                }
            })
            .boxed()
    }

    /// Enumerate only the subdirectories under this directory.
    pub fn directories(
        &self,
        recursive: bool,
    ) -> BoxStream<'static, Result<VirtualDirectory, VfsError>> {
        self.entries(
            ListOptions::default()
                .recursive(recursive)
                .directories_only(),
        )
        .filter_map(|entry| async move {
            match entry {
                Ok(VfsEntry::Directory(dir)) => Some(Ok(dir)),
                Ok(VfsEntry::File(_)) => None,
                Err(err) => Some(Err(err)),
            }
        })
        .boxed()
    }

    /// Create a file inside this directory.
    ///
    /// Writes a zero-length object with the given content type and metadata.
    ///
    /// # Errors
    /// `AlreadyExists` when the target exists and overwrite wasn't requested.
    pub async fn create_file(
        &self,
        name: &str,
        options: CreateFileOptions,
    ) -> Result<VirtualFile, VfsError> {
        let path: VfsPath = self.path.join(name)?;
        let container: &str = self.ctx.container();
        let key: &str = path.to_blob_key();

        if !options.overwrite {
            let exists: bool = self
                .ctx
                .meta
                .file_exists(container, key)
                .await
                .map_err(|e| VfsError::operation("check object existence", e))?;
            if exists {
                return Err(VfsError::AlreadyExists(path));
            }
        }

        let mut metadata: HashMap<String, String> = options.metadata.unwrap_or_default();
        metadata
            .entry(CUSTOM_CREATED_KEY.to_string())
            .or_insert_with(|| now_epoch_secs().to_string());
        let put_options = PutOptions {
            content_type: options.content_type,
            metadata: Some(metadata),
        };
        let stored = self
            .ctx
            .storage
            .put(container, key, Bytes::new(), put_options)
            .await
            .map_err(|e| VfsError::operation("create object", e))?;

        self.ctx.meta.invalidate(container, key).await;
        self.ctx
            .meta
            .cache()
            .invalidate_dir(container, self.path.to_blob_key())
            .await;
        let state: Arc<FileState> = Arc::new(FileState::from_metadata(stored));
        self.ctx.meta.record(container, key, state.clone()).await;

        Ok(VirtualFile::with_state(self.ctx.clone(), path, state))
    }

    /// Create a subdirectory.
    ///
    /// Behavior is keyed on the configured strategy: `ZeroByteMarker`
    /// uploads an empty object at `<dir>/`, `DotKeepFile` writes an empty
    /// `.keep` file inside the directory, and `Virtual` performs no storage
    /// operation at all (existence stays purely inferential).
    pub async fn create_directory(&self, name: &str) -> Result<VirtualDirectory, VfsError> {
        let path: VfsPath = self.path.join(name)?;
        let dir = VirtualDirectory::new(self.ctx.clone(), path.clone());
        let container: &str = self.ctx.container();

        let marker: Option<(String, Option<String>)> = match self.ctx.options.directory_strategy {
            DirectoryStrategy::Virtual => None,
            DirectoryStrategy::ZeroByteMarker => Some((
                prefix_of(&path),
                Some(DIRECTORY_CONTENT_TYPE.to_string()),
            )),
            DirectoryStrategy::DotKeepFile => {
                Some((format!("{}{}", prefix_of(&path), DOT_KEEP_NAME), None))
            }
        };
        if let Some((key, content_type)) = marker {
            let put_options = PutOptions {
                content_type,
                metadata: None,
            };
            self.ctx
                .storage
                .put(container, &key, Bytes::new(), put_options)
                .await
                .map_err(|e| VfsError::operation("create directory marker", e))?;
            self.ctx
                .meta
                .cache()
                .invalidate_dir(container, path.to_blob_key())
                .await;
        }
        Ok(dir)
    }

    /// Compute aggregate statistics by traversing the prefix.
    ///
    /// O(n) in the number of objects, never cached - the result is a
    /// point-in-time snapshot. Malformed entries are skipped.
    pub async fn stats(&self, recursive: bool) -> Result<DirectoryStats, VfsError> {
        let container: &str = self.ctx.container();
        let prefix: String = prefix_of(&self.path);
        let mut stats = DirectoryStats::default();
        let mut seen_dirs: HashSet<String> = HashSet::new();

        let mut items = self.ctx.storage.list(container, &prefix);
        while let Some(item) = items.next().await {
            let item: BlobItem = item.map_err(|e| VfsError::operation("list objects", e))?;
            let rel: &str = match item.key.strip_prefix(&prefix) {
                Some(rel) => rel,
                None => continue,
            };
            if rel.is_empty() {
                continue;
            }

            let file_name: Option<&str> = if recursive {
                let mut segments: Vec<&str> = rel.split('/').collect();
                let last: &str = segments.pop().unwrap_or("");
                let mut cumulative = String::new();
                for segment in &segments {
                    if !cumulative.is_empty() {
                        cumulative.push('/');
                    }
                    cumulative.push_str(segment);
                    if seen_dirs.insert(cumulative.clone()) {
                        stats.directory_count += 1;
                    }
                }
                (!last.is_empty()).then_some(last)
            } else {
                match rel.find('/') {
                    Some(pos) => {
                        let dir_name: &str = &rel[..pos];
                        if !dir_name.is_empty() && seen_dirs.insert(dir_name.to_string()) {
                            stats.directory_count += 1;
                        }
                        None
                    }
                    None => Some(rel),
                }
            };

            let Some(file_name) = file_name else {
                continue;
            };
            stats.file_count += 1;
            stats.total_size += item.size;
            *stats
                .extensions
                .entry(extension_of(file_name).to_string())
                .or_insert(0) += 1;

            if stats
                .largest_file
                .as_ref()
                .map(|(_, size)| item.size > *size)
                .unwrap_or(true)
            {
                if let Ok(path) = self.path.join(rel) {
                    stats.largest_file = Some((path, item.size));
                }
            }
            if let Some(modified) =
                item.last_modified.map(crate::meta::epoch_secs_to_system_time)
            {
                if stats.oldest_modified.map(|t| modified < t).unwrap_or(true) {
                    stats.oldest_modified = Some(modified);
                }
                if stats.newest_modified.map(|t| modified > t).unwrap_or(true) {
                    stats.newest_modified = Some(modified);
                }
            }
        }
        Ok(stats)
    }

    /// Delete this directory's objects.
    ///
    /// Non-recursive mode removes only direct children; see
    /// [`VirtualFileSystem::delete_directory`](crate::VirtualFileSystem::delete_directory).
    pub async fn delete(&self, recursive: bool) -> Result<DeleteDirectoryResult, VfsError> {
        self.ctx.delete_directory(&self.path, recursive).await
    }
}
