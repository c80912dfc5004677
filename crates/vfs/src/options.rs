//! Configuration options and transient result types.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::VfsError;
use crate::path::VfsPath;

/// Content type recorded on zero-byte directory marker objects.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// Name of the placeholder file written by [`DirectoryStrategy::DotKeepFile`].
pub const DOT_KEEP_NAME: &str = ".keep";

/// How directories are made observable in a store that only has keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectoryStrategy {
    /// No marker object is ever created; a directory exists iff at least one
    /// object lives under its key prefix.
    #[default]
    Virtual,
    /// An empty object at `<dir>/` with content type
    /// `application/x-directory`.
    ZeroByteMarker,
    /// An empty `.keep` file inside the directory.
    DotKeepFile,
}

/// Configuration surface for [`VirtualFileSystem`](crate::VirtualFileSystem).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsOptions {
    /// Container (bucket) all paths resolve into.
    pub default_container: String,
    /// Directory marker strategy.
    pub directory_strategy: DirectoryStrategy,
    /// Whether existence/metadata lookups go through the TTL cache.
    pub enable_cache: bool,
    /// Time-to-live for cached entries.
    pub cache_ttl: Duration,
    /// Listing entries produced between cooperative yields; `0` means
    /// unbounded.
    pub default_page_size: usize,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            default_container: "default".to_string(),
            directory_strategy: DirectoryStrategy::Virtual,
            enable_cache: true,
            cache_ttl: Duration::from_secs(60),
            default_page_size: 1000,
        }
    }
}

impl VfsOptions {
    /// Set the container name.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.default_container = container.into();
        self
    }

    /// Set the directory marker strategy.
    pub fn with_directory_strategy(mut self, strategy: DirectoryStrategy) -> Self {
        self.directory_strategy = strategy;
        self
    }

    /// Enable or disable the metadata cache.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    /// Set the cache time-to-live.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the listing page size (`0` = unbounded).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }
}

/// Options for directory listing.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Glob pattern applied to entry names before emission.
    pub pattern: Option<String>,
    /// Emit file entries.
    pub include_files: bool,
    /// Emit directory entries.
    pub include_directories: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            pattern: None,
            include_files: true,
            include_directories: true,
        }
    }
}

impl ListOptions {
    /// Set recursive descent.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the name pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Restrict the listing to files.
    pub fn files_only(mut self) -> Self {
        self.include_files = true;
        self.include_directories = false;
        self
    }

    /// Restrict the listing to directories.
    pub fn directories_only(mut self) -> Self {
        self.include_files = false;
        self.include_directories = true;
        self
    }
}

/// Options for opening a file for writing.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Replace an existing object. When false, writing over an existing
    /// object fails with `AlreadyExists`.
    pub overwrite: bool,
    /// Optimistic-concurrency precondition: the write fails with a
    /// `Concurrency` error unless the object's current version tag equals
    /// this value. When omitted, the last writer wins.
    pub expected_etag: Option<String>,
    /// Content type to record.
    pub content_type: Option<String>,
    /// Custom metadata to attach.
    pub metadata: Option<HashMap<String, String>>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            expected_etag: None,
            content_type: None,
            metadata: None,
        }
    }
}

impl WriteOptions {
    /// Set the overwrite flag.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the expected version tag.
    pub fn with_expected_etag(mut self, etag: impl Into<String>) -> Self {
        self.expected_etag = Some(etag.into());
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the custom metadata map.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Options for creating a file inside a directory.
#[derive(Debug, Clone, Default)]
pub struct CreateFileOptions {
    /// Replace an existing object instead of failing with `AlreadyExists`.
    pub overwrite: bool,
    /// Content type to record.
    pub content_type: Option<String>,
    /// Custom metadata to attach.
    pub metadata: Option<HashMap<String, String>>,
}

impl CreateFileOptions {
    /// Set the overwrite flag.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the custom metadata map.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Options for copy and move operations.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Required for directory copies; ignored for single files.
    pub recursive: bool,
    /// Replace existing destination objects. For directory copies, existing
    /// destinations are skipped (not errors) when this is off.
    pub overwrite: bool,
    /// Copy custom metadata along with content.
    pub copy_metadata: bool,
}

impl CopyOptions {
    /// Set recursive directory copying.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the overwrite flag.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set whether custom metadata travels with the content.
    pub fn with_copy_metadata(mut self, copy_metadata: bool) -> Self {
        self.copy_metadata = copy_metadata;
        self
    }
}

/// Snapshot of copy progress.
#[derive(Debug, Clone)]
pub struct CopyProgress {
    /// Files fully copied so far.
    pub files_copied: u64,
    /// Total files the operation will attempt.
    pub total_files: u64,
    /// Bytes copied so far.
    pub bytes_copied: u64,
    /// Total bytes the operation will attempt.
    pub total_bytes: u64,
    /// Path currently being copied, if any.
    pub current: Option<VfsPath>,
}

/// Callback trait for copy progress reporting.
pub trait CopyProgressObserver: Send + Sync {
    /// Called with progress updates.
    /// Returns false to cancel the operation.
    fn on_progress(&self, progress: &CopyProgress) -> bool;
}

/// Outcome of a copy or move operation.
#[derive(Debug, Default)]
pub struct CopyResult {
    /// Files copied.
    pub files_copied: u64,
    /// Bytes copied.
    pub bytes_copied: u64,
    /// Destinations skipped because they already existed.
    pub skipped: u64,
    /// Per-item failures, by source key.
    pub errors: Vec<(String, VfsError)>,
}

impl CopyResult {
    /// True when every item copied (or was deliberately skipped).
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of a directory deletion.
#[derive(Debug, Default)]
pub struct DeleteDirectoryResult {
    /// Objects removed.
    pub deleted: u64,
    /// Per-item failures, by key.
    pub errors: Vec<(String, VfsError)>,
}

impl DeleteDirectoryResult {
    /// True when every targeted object was removed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Point-in-time aggregate over a directory tree.
///
/// Computed by full traversal and never cached.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStats {
    /// Number of files seen.
    pub file_count: u64,
    /// Number of (inferred) subdirectories seen.
    pub directory_count: u64,
    /// Sum of file sizes in bytes.
    pub total_size: u64,
    /// File count per extension; extensionless files land under `""`.
    pub extensions: HashMap<String, u64>,
    /// Largest file and its size.
    pub largest_file: Option<(VfsPath, u64)>,
    /// Oldest modification timestamp seen.
    pub oldest_modified: Option<SystemTime>,
    /// Newest modification timestamp seen.
    pub newest_modified: Option<SystemTime>,
}
