//! Integration tests for directory-listing semantics.
//!
//! Listings must infer one-level or recursive structure purely from the keys
//! a prefix query returns:
//! - non-recursive: first segments become directories, emitted once
//! - recursive: files plus every intermediate directory exactly once
//! - page size changes the suspension cadence, never the yielded set

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;

use blobfs_storage::MemoryBlobStorage;
use blobfs_vfs::{
    DirectoryStrategy, ListOptions, VfsEntry, VfsNodeKind, VfsOptions, VfsPath, VirtualFileSystem,
};

fn path(raw: &str) -> VfsPath {
    VfsPath::new(raw).unwrap()
}

fn create_vfs(options: VfsOptions) -> VirtualFileSystem {
    VirtualFileSystem::new(Arc::new(MemoryBlobStorage::new()), options)
}

async fn seed(vfs: &VirtualFileSystem, paths: &[&str]) {
    for raw in paths {
        vfs.get_file(path(raw)).write_all_bytes(b"x").await.unwrap();
    }
}

/// Collect (kind, name) pairs from a listing.
async fn collect(
    vfs: &VirtualFileSystem,
    dir: &str,
    options: ListOptions,
) -> Vec<(VfsNodeKind, String)> {
    let entries: Vec<Result<VfsEntry, _>> = vfs.list(&path(dir), options).collect().await;
    entries
        .into_iter()
        .map(|entry| {
            let entry: VfsEntry = entry.unwrap();
            (entry.kind(), entry.name().to_string())
        })
        .collect()
}

mod non_recursive {
    use super::*;

    #[tokio::test]
    async fn test_children_are_inferred_from_keys() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/a/x", "/a/y", "/a/b/z"]).await;

        let mut listed = collect(&vfs, "/a", ListOptions::default()).await;
        listed.sort();

        let mut expected = vec![
            (VfsNodeKind::File, "x".to_string()),
            (VfsNodeKind::File, "y".to_string()),
            (VfsNodeKind::Directory, "b".to_string()),
        ];
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn test_deep_objects_never_surface_directly() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/a/b/z", "/a/b/c/w"]).await;

        let listed = collect(&vfs, "/a", ListOptions::default()).await;

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], (VfsNodeKind::Directory, "b".to_string()));
    }

    #[tokio::test]
    async fn test_subdirectory_emitted_once_despite_many_children() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/a/b/1", "/a/b/2", "/a/b/3"]).await;

        let listed = collect(&vfs, "/a", ListOptions::default()).await;
        assert_eq!(listed, vec![(VfsNodeKind::Directory, "b".to_string())]);
    }

    #[tokio::test]
    async fn test_listing_missing_directory_is_empty() {
        let vfs = create_vfs(VfsOptions::default());
        let listed = collect(&vfs, "/nothing/here", ListOptions::default()).await;
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_sibling_prefix_does_not_leak() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/app/one", "/apple/two"]).await;

        let listed = collect(&vfs, "/app", ListOptions::default()).await;
        assert_eq!(listed, vec![(VfsNodeKind::File, "one".to_string())]);
    }
}

mod recursive {
    use super::*;

    #[tokio::test]
    async fn test_files_and_intermediate_directories_exactly_once() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/a/x", "/a/y", "/a/b/z"]).await;

        let listed = collect(&vfs, "/a", ListOptions::default().recursive(true)).await;

        let files: Vec<&str> = listed
            .iter()
            .filter(|(kind, _)| *kind == VfsNodeKind::File)
            .map(|(_, name)| name.as_str())
            .collect();
        let dirs: Vec<&str> = listed
            .iter()
            .filter(|(kind, _)| *kind == VfsNodeKind::Directory)
            .map(|(_, name)| name.as_str())
            .collect();

        let file_set: HashSet<&str> = files.iter().copied().collect();
        assert_eq!(file_set, HashSet::from(["x", "y", "z"]));
        assert_eq!(files.len(), 3);
        assert_eq!(dirs, vec!["b"]);
    }

    #[tokio::test]
    async fn test_nested_intermediates_all_appear() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/r/a/b/c/file.txt", "/r/a/other.txt"]).await;

        let listed = collect(&vfs, "/r", ListOptions::default().recursive(true)).await;

        let dirs: Vec<&String> = listed
            .iter()
            .filter(|(kind, _)| *kind == VfsNodeKind::Directory)
            .map(|(_, name)| name)
            .collect();
        assert_eq!(dirs.len(), 3); // a, b, c - each once
    }

    #[tokio::test]
    async fn test_recursive_entry_paths_are_absolute() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/r/a/b/file.txt"]).await;

        let entries: Vec<VfsEntry> = vfs
            .list(&path("/r"), ListOptions::default().recursive(true))
            .map(|e| e.unwrap())
            .collect()
            .await;

        let paths: HashSet<String> = entries
            .iter()
            .map(|e| e.path().as_str().to_string())
            .collect();
        assert_eq!(
            paths,
            HashSet::from([
                "/r/a".to_string(),
                "/r/a/b".to_string(),
                "/r/a/b/file.txt".to_string(),
            ])
        );
    }
}

mod pagination {
    use super::*;

    /// Varying the page size must not change the set of yielded entries,
    /// only how often the producer yields control.
    #[tokio::test]
    async fn test_page_size_does_not_change_the_result_set() {
        let seeded: Vec<String> = (0..37).map(|i| format!("/big/file-{:02}", i)).collect();
        let seeded_refs: Vec<&str> = seeded.iter().map(String::as_str).collect();

        let mut baseline: Option<Vec<(VfsNodeKind, String)>> = None;
        for page_size in [1usize, 2, 10, 1000, 0] {
            let vfs = create_vfs(VfsOptions::default().with_page_size(page_size));
            seed(&vfs, &seeded_refs).await;

            let mut listed = collect(&vfs, "/big", ListOptions::default()).await;
            listed.sort();
            assert_eq!(listed.len(), 37, "page_size={}", page_size);

            match &baseline {
                None => baseline = Some(listed),
                Some(expected) => assert_eq!(&listed, expected, "page_size={}", page_size),
            }
        }
    }

    #[tokio::test]
    async fn test_consumer_can_stop_early() {
        let vfs = create_vfs(VfsOptions::default().with_page_size(1));
        seed(&vfs, &["/s/a", "/s/b", "/s/c", "/s/d"]).await;

        let mut stream = vfs.list(&path("/s"), ListOptions::default());
        let first = stream.next().await;
        assert!(first.is_some());
        drop(stream); // cancelling mid-listing must be safe
    }
}

mod filtering {
    use super::*;

    #[tokio::test]
    async fn test_name_pattern_applies_to_files_and_directories() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/p/notes.txt", "/p/image.png", "/p/texts/inner.md"]).await;

        let listed = collect(
            &vfs,
            "/p",
            ListOptions::default().with_pattern("*t*"),
        )
        .await;

        let names: HashSet<String> = listed.into_iter().map(|(_, name)| name).collect();
        // "texts" (directory) and "notes.txt" match; "image.png" does not
        assert_eq!(
            names,
            HashSet::from(["notes.txt".to_string(), "texts".to_string()])
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_a_typed_error() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/p/a.txt"]).await;

        let mut stream = vfs.list(
            &path("/p"),
            ListOptions::default().with_pattern("[invalid"),
        );
        let first = stream.next().await.unwrap();
        assert!(matches!(
            first,
            Err(blobfs_vfs::VfsError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_include_flags() {
        let vfs = create_vfs(VfsOptions::default());
        seed(&vfs, &["/f/a.txt", "/f/sub/b.txt"]).await;

        let dir = vfs.get_directory(path("/f"));

        let files: Vec<_> = dir.files(false).map(|f| f.unwrap()).collect().await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "a.txt");

        let dirs: Vec<_> = dir.directories(false).map(|d| d.unwrap()).collect().await;
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].name(), "sub");
    }
}

mod markers {
    use super::*;

    #[tokio::test]
    async fn test_zero_byte_marker_directories_list_as_directories() {
        let vfs = create_vfs(
            VfsOptions::default().with_directory_strategy(DirectoryStrategy::ZeroByteMarker),
        );
        let root = vfs.root();
        root.create_directory("empty").await.unwrap();

        let listed = collect(&vfs, "/", ListOptions::default()).await;
        assert_eq!(listed, vec![(VfsNodeKind::Directory, "empty".to_string())]);

        // Recursive listings do not surface the marker as a file either
        let recursive = collect(&vfs, "/", ListOptions::default().recursive(true)).await;
        assert_eq!(
            recursive,
            vec![(VfsNodeKind::Directory, "empty".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dot_keep_directories_list_their_placeholder() {
        let vfs = create_vfs(
            VfsOptions::default().with_directory_strategy(DirectoryStrategy::DotKeepFile),
        );
        vfs.root().create_directory("kept").await.unwrap();

        let listed = collect(&vfs, "/", ListOptions::default()).await;
        assert_eq!(listed, vec![(VfsNodeKind::Directory, "kept".to_string())]);

        // The placeholder is a real object and shows up inside the directory
        let inside = collect(&vfs, "/kept", ListOptions::default()).await;
        assert_eq!(inside, vec![(VfsNodeKind::File, ".keep".to_string())]);
    }
}
