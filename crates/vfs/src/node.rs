//! Node model: files and directories behind one sum type.

use crate::dir::VirtualDirectory;
use crate::error::VfsError;
use crate::file::VirtualFile;
use crate::path::VfsPath;

/// Discriminator for [`VfsEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VfsNodeKind {
    /// A file entry.
    File,
    /// A directory entry.
    Directory,
}

/// One node in the virtual tree.
///
/// Callers match on the variant to reach kind-specific members; the shared
/// subset (path, name, existence) is available on the enum itself.
#[derive(Clone)]
pub enum VfsEntry {
    /// A file.
    File(VirtualFile),
    /// A directory.
    Directory(VirtualDirectory),
}

impl VfsEntry {
    /// Which kind of node this is.
    pub fn kind(&self) -> VfsNodeKind {
        match self {
            VfsEntry::File(_) => VfsNodeKind::File,
            VfsEntry::Directory(_) => VfsNodeKind::Directory,
        }
    }

    /// Path of the node.
    pub fn path(&self) -> &VfsPath {
        match self {
            VfsEntry::File(file) => file.path(),
            VfsEntry::Directory(dir) => dir.path(),
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path().file_name()
    }

    /// Whether the node is currently observable in storage.
    pub async fn exists(&self) -> Result<bool, VfsError> {
        match self {
            VfsEntry::File(file) => file.exists().await,
            VfsEntry::Directory(dir) => dir.exists().await,
        }
    }

    /// Borrow as a file, if this is one.
    pub fn as_file(&self) -> Option<&VirtualFile> {
        match self {
            VfsEntry::File(file) => Some(file),
            VfsEntry::Directory(_) => None,
        }
    }

    /// Borrow as a directory, if this is one.
    pub fn as_directory(&self) -> Option<&VirtualDirectory> {
        match self {
            VfsEntry::Directory(dir) => Some(dir),
            VfsEntry::File(_) => None,
        }
    }

    /// Consume into a file, if this is one.
    pub fn into_file(self) -> Option<VirtualFile> {
        match self {
            VfsEntry::File(file) => Some(file),
            VfsEntry::Directory(_) => None,
        }
    }

    /// Consume into a directory, if this is one.
    pub fn into_directory(self) -> Option<VirtualDirectory> {
        match self {
            VfsEntry::Directory(dir) => Some(dir),
            VfsEntry::File(_) => None,
        }
    }
}
