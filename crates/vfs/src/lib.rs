//! Hierarchical virtual file system over flat blob storage.
//!
//! Clients navigate a conventional tree of files and directories even though
//! the backing store only understands string keys and prefix queries. This
//! crate supplies the path model, node handles, listing, caching and
//! copy/move orchestration; the store itself is any implementation of
//! [`blobfs_storage::BlobStorage`].
//!
//! # Architecture
//!
//! ```text
//! Layer 3: VirtualFileSystem (facade: existence, delete, move, copy, listing)
//! Layer 2: VirtualFile / VirtualDirectory (handles, streams, inference)
//! Layer 1: MetadataManager + TTL cache over BlobStorage
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blobfs_storage::MemoryBlobStorage;
//! use blobfs_vfs::{VfsOptions, VfsPath, VirtualFileSystem};
//!
//! let vfs = VirtualFileSystem::new(Arc::new(MemoryBlobStorage::new()), VfsOptions::default());
//! let file = vfs.get_file(VfsPath::new("/docs/readme.txt")?);
//! file.write_all_text("hello").await?;
//! assert_eq!(file.read_all_text().await?, "hello");
//! ```

mod cache;
mod dir;
mod error;
mod file;
mod fs;
mod meta;
mod node;
mod options;
mod path;

pub use dir::VirtualDirectory;
pub use error::VfsError;
pub use file::{FileWriter, MultipartUpload, VirtualFile};
pub use fs::VirtualFileSystem;
pub use meta::{FileState, CUSTOM_CONTENT_HASH_KEY, CUSTOM_CREATED_KEY};
pub use node::{VfsEntry, VfsNodeKind};
pub use options::{
    CopyOptions, CopyProgress, CopyProgressObserver, CopyResult, CreateFileOptions,
    DeleteDirectoryResult, DirectoryStats, DirectoryStrategy, ListOptions, VfsOptions,
    WriteOptions, DIRECTORY_CONTENT_TYPE, DOT_KEEP_NAME,
};
pub use path::{VfsPath, VfsPathError};

// Re-export the storage seam for convenience
pub use blobfs_storage::{BlobItem, BlobMetadata, BlobReadStream, BlobStorage, StorageError};
