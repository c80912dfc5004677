//! End-to-end scenarios across the facade, handles, cache and strategies.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use blobfs_storage::{BlobStorage, MemoryBlobStorage};
use blobfs_vfs::{
    CreateFileOptions, DeleteDirectoryResult, DirectoryStrategy, ListOptions, VfsEntry,
    VfsNodeKind, VfsOptions, VfsPath, VirtualFileSystem, DIRECTORY_CONTENT_TYPE,
};

fn path(raw: &str) -> VfsPath {
    VfsPath::new(raw).unwrap()
}

fn create_env(options: VfsOptions) -> (VirtualFileSystem, Arc<MemoryBlobStorage>) {
    let storage = Arc::new(MemoryBlobStorage::new());
    let vfs = VirtualFileSystem::new(storage.clone(), options);
    (vfs, storage)
}

mod scenarios {
    use super::*;

    /// Create a file, read it back, observe its size.
    #[tokio::test]
    async fn test_create_write_read() {
        let (vfs, _) = create_env(VfsOptions::default());

        let docs = vfs.get_directory(path("/docs"));
        let file = docs
            .create_file("readme.txt", CreateFileOptions::default())
            .await
            .unwrap();
        file.write_all_text("hello").await.unwrap();

        assert_eq!(file.read_all_text().await.unwrap(), "hello");
        assert_eq!(file.size().await.unwrap(), 5);
    }

    /// Non-recursive directory deletion removes direct children only.
    #[tokio::test]
    async fn test_non_recursive_delete_leaves_deeper_keys() {
        let (vfs, _) = create_env(VfsOptions::default());
        vfs.get_file(path("/dir/a.txt")).write_all_text("a").await.unwrap();
        vfs.get_file(path("/dir/b.txt")).write_all_text("b").await.unwrap();
        vfs.get_file(path("/keep.txt")).write_all_text("keep").await.unwrap();

        let result: DeleteDirectoryResult =
            vfs.delete_directory(&path("/dir"), false).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.deleted, 2);
        assert!(vfs.file_exists(&path("/keep.txt")).await.unwrap());

        let listed: Vec<_> = vfs
            .list(&path("/dir"), ListOptions::default())
            .collect()
            .await;
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_non_recursive_delete_spares_nested_objects() {
        let (vfs, _) = create_env(VfsOptions::default());
        vfs.get_file(path("/dir/direct.txt")).write_all_text("d").await.unwrap();
        vfs.get_file(path("/dir/nested/deep.txt")).write_all_text("n").await.unwrap();

        vfs.delete_directory(&path("/dir"), false).await.unwrap();

        assert!(!vfs.file_exists(&path("/dir/direct.txt")).await.unwrap());
        assert!(vfs.file_exists(&path("/dir/nested/deep.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_recursive_delete_empties_the_tree() {
        let (vfs, _) = create_env(VfsOptions::default());
        vfs.get_file(path("/dir/a.txt")).write_all_text("a").await.unwrap();
        vfs.get_file(path("/dir/nested/deep.txt")).write_all_text("n").await.unwrap();

        let result = vfs.delete_directory(&path("/dir"), true).await.unwrap();

        assert_eq!(result.deleted, 2);
        assert!(!vfs.directory_exists(&path("/dir")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_accumulates_per_object_failures() {
        let (vfs, storage) = create_env(VfsOptions::default());
        vfs.get_file(path("/dir/ok.txt")).write_all_text("1").await.unwrap();
        vfs.get_file(path("/dir/stuck.txt")).write_all_text("2").await.unwrap();
        storage.inject_failure("default", "dir/stuck.txt");

        let result = vfs.delete_directory(&path("/dir"), true).await.unwrap();

        assert!(!result.is_success());
        assert_eq!(result.deleted, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, "dir/stuck.txt");
    }
}

mod cache_correctness {
    use super::*;

    /// A successful delete must invalidate a still-unexpired positive cache
    /// entry.
    #[tokio::test]
    async fn test_exists_is_false_right_after_delete() {
        let (vfs, _) = create_env(
            VfsOptions::default().with_cache_ttl(Duration::from_secs(3600)),
        );
        let target = path("/cached.txt");
        vfs.get_file(target.clone()).write_all_text("x").await.unwrap();

        // Prime the cache with a positive answer
        assert!(vfs.file_exists(&target).await.unwrap());

        assert!(vfs.delete_file(&target).await.unwrap());
        assert!(!vfs.file_exists(&target).await.unwrap());
    }

    /// With the cache enabled, repeated checks answer from the cache: a
    /// backend-side change the VFS didn't make stays invisible until the TTL
    /// lapses.
    #[tokio::test]
    async fn test_cached_answer_survives_out_of_band_backend_changes() {
        let (vfs, storage) = create_env(
            VfsOptions::default().with_cache_ttl(Duration::from_secs(3600)),
        );
        let target = path("/side.txt");
        vfs.get_file(target.clone()).write_all_text("x").await.unwrap();
        assert!(vfs.file_exists(&target).await.unwrap());

        // Out-of-band delete, bypassing the VFS
        storage.delete("default", "side.txt").await.unwrap();

        assert!(vfs.file_exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_cache_observes_backend_directly() {
        let (vfs, storage) = create_env(VfsOptions::default().with_cache_enabled(false));
        let target = path("/side.txt");
        vfs.get_file(target.clone()).write_all_text("x").await.unwrap();
        assert!(vfs.file_exists(&target).await.unwrap());

        storage.delete("default", "side.txt").await.unwrap();

        assert!(!vfs.file_exists(&target).await.unwrap());
    }
}

mod entry_resolution {
    use super::*;

    #[tokio::test]
    async fn test_get_entry_dispatches_on_kind() {
        let (vfs, _) = create_env(VfsOptions::default());
        vfs.get_file(path("/file.txt")).write_all_text("f").await.unwrap();
        vfs.get_file(path("/folder/inner.txt")).write_all_text("i").await.unwrap();

        let file: VfsEntry = vfs.get_entry(&path("/file.txt")).await.unwrap().unwrap();
        assert_eq!(file.kind(), VfsNodeKind::File);
        assert_eq!(file.name(), "file.txt");

        let dir: VfsEntry = vfs.get_entry(&path("/folder")).await.unwrap().unwrap();
        assert_eq!(dir.kind(), VfsNodeKind::Directory);
        assert!(dir.exists().await.unwrap());

        assert!(vfs.get_entry(&path("/absent")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parent_lookup() {
        let (vfs, _) = create_env(VfsOptions::default());
        let file = vfs.get_file(path("/a/b/c.txt"));

        let parent = file.parent();
        assert_eq!(parent.path().as_str(), "/a/b");
        assert_eq!(parent.parent().path().as_str(), "/a");
    }
}

mod directory_strategies {
    use super::*;

    #[tokio::test]
    async fn test_virtual_strategy_writes_nothing() {
        let (vfs, storage) = create_env(VfsOptions::default());

        let dir = vfs.root().create_directory("ghost").await.unwrap();

        assert_eq!(storage.object_count(), 0);
        // Purely inferential: nothing under the prefix, so it doesn't exist
        assert!(!dir.exists().await.unwrap());

        vfs.get_file(path("/ghost/file")).write_all_text("x").await.unwrap();
        dir.refresh().await;
        assert!(dir.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_byte_marker_strategy() {
        let (vfs, storage) = create_env(
            VfsOptions::default().with_directory_strategy(DirectoryStrategy::ZeroByteMarker),
        );

        let dir = vfs.root().create_directory("data").await.unwrap();

        assert!(dir.exists().await.unwrap());
        let marker = storage.head("default", "data/").await.unwrap().unwrap();
        assert_eq!(marker.size, 0);
        assert_eq!(
            marker.content_type.as_deref(),
            Some(DIRECTORY_CONTENT_TYPE)
        );
        assert!(dir.last_modified().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dot_keep_strategy() {
        let (vfs, storage) = create_env(
            VfsOptions::default().with_directory_strategy(DirectoryStrategy::DotKeepFile),
        );

        let dir = vfs.root().create_directory("data").await.unwrap();

        assert!(dir.exists().await.unwrap());
        let keep = storage.head("default", "data/.keep").await.unwrap().unwrap();
        assert_eq!(keep.size, 0);
    }
}

mod create_file {
    use super::*;

    #[tokio::test]
    async fn test_create_fails_on_existing_without_overwrite() {
        let (vfs, _) = create_env(VfsOptions::default());
        let dir = vfs.get_directory(path("/d"));
        dir.create_file("f.txt", CreateFileOptions::default()).await.unwrap();

        let result = dir.create_file("f.txt", CreateFileOptions::default()).await;
        assert!(matches!(result, Err(blobfs_vfs::VfsError::AlreadyExists(_))));

        // With overwrite it succeeds
        dir.create_file("f.txt", CreateFileOptions::default().with_overwrite(true))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_created_file_is_empty_with_requested_content_type() {
        let (vfs, _) = create_env(VfsOptions::default());
        let dir = vfs.get_directory(path("/d"));

        let file = dir
            .create_file(
                "empty.json",
                CreateFileOptions::default().with_content_type("application/json"),
            )
            .await
            .unwrap();

        assert_eq!(file.size().await.unwrap(), 0);
        assert_eq!(
            file.content_type().await.unwrap().as_deref(),
            Some("application/json")
        );
        assert!(file.created().await.unwrap().is_some());
    }
}

mod statistics {
    use super::*;

    #[tokio::test]
    async fn test_stats_aggregate_the_tree() {
        let (vfs, _) = create_env(VfsOptions::default());
        vfs.get_file(path("/s/one.txt")).write_all_text("12345").await.unwrap();
        vfs.get_file(path("/s/two.txt")).write_all_text("1").await.unwrap();
        vfs.get_file(path("/s/sub/pic.png")).write_all_text("123").await.unwrap();

        let stats = vfs.get_directory(path("/s")).stats(true).await.unwrap();

        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.directory_count, 1);
        assert_eq!(stats.total_size, 9);
        assert_eq!(stats.extensions.get("txt"), Some(&2));
        assert_eq!(stats.extensions.get("png"), Some(&1));
        let (largest, size) = stats.largest_file.unwrap();
        assert_eq!(largest.as_str(), "/s/one.txt");
        assert_eq!(size, 5);
        assert!(stats.oldest_modified.is_some());
        assert!(stats.newest_modified.is_some());
    }

    #[tokio::test]
    async fn test_one_level_stats_ignore_nested_files() {
        let (vfs, _) = create_env(VfsOptions::default());
        vfs.get_file(path("/s/direct.txt")).write_all_text("123").await.unwrap();
        vfs.get_file(path("/s/sub/nested.txt")).write_all_text("12345").await.unwrap();

        let stats = vfs.get_directory(path("/s")).stats(false).await.unwrap();

        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.directory_count, 1);
        assert_eq!(stats.total_size, 3);
    }
}
