//! Flat blob-storage abstraction for blobfs.
//!
//! This crate defines the interface the virtual file system layers on top of:
//! a store that understands string keys, byte payloads and prefix queries,
//! and nothing about hierarchy. Vendor backends (S3, Azure, GCS, ...)
//! implement [`BlobStorage`] in their own crates; this one ships only the
//! trait, its error type, and an in-memory backend used by tests and local
//! development.

mod error;
mod memory;
mod traits;

pub use error::StorageError;
pub use memory::MemoryBlobStorage;
pub use traits::{BlobItem, BlobMetadata, BlobReadStream, BlobStorage, PutOptions};
