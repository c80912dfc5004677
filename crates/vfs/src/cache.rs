//! TTL cache for existence and metadata lookups.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::meta::FileState;

/// Bounded number of cached entries.
const CACHE_CAPACITY: u64 = 100_000;

/// What a cache entry answers for a key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKind {
    /// Does a backing object exist at this key?
    FileExists,
    /// Does at least one object exist under this key's prefix?
    DirExists,
    /// Full metadata snapshot.
    Metadata,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    container: String,
    key: String,
    kind: CacheKind,
}

/// Cached value.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// Existence answer (file or directory, per the key's kind).
    Exists(bool),
    /// Metadata snapshot.
    Metadata(Arc<FileState>),
}

/// Keyed TTL cache used to avoid repeated backend round-trips.
///
/// Entries are keyed by container + blob key + [`CacheKind`]. Internally
/// thread-safe; callers never take locks. When constructed disabled, every
/// lookup misses and every insert is a no-op, so call sites don't branch.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    inner: Option<Cache<CacheKey, CacheEntry>>,
}

impl MetadataCache {
    /// Create a cache with the given TTL, or a disabled no-op cache.
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        let inner = enabled.then(|| {
            Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    /// Look up an entry.
    pub async fn get(&self, container: &str, key: &str, kind: CacheKind) -> Option<CacheEntry> {
        let cache = self.inner.as_ref()?;
        cache
            .get(&CacheKey {
                container: container.to_string(),
                key: key.to_string(),
                kind,
            })
            .await
    }

    /// Store an entry under the configured TTL.
    pub async fn insert(&self, container: &str, key: &str, kind: CacheKind, entry: CacheEntry) {
        if let Some(cache) = &self.inner {
            cache
                .insert(
                    CacheKey {
                        container: container.to_string(),
                        key: key.to_string(),
                        kind,
                    },
                    entry,
                )
                .await;
        }
    }

    /// Drop every kind of entry for a key.
    pub async fn invalidate(&self, container: &str, key: &str) {
        if let Some(cache) = &self.inner {
            for kind in [CacheKind::FileExists, CacheKind::DirExists, CacheKind::Metadata] {
                cache
                    .invalidate(&CacheKey {
                        container: container.to_string(),
                        key: key.to_string(),
                        kind,
                    })
                    .await;
            }
        }
    }

    /// Drop only the directory-existence entry for a key.
    pub async fn invalidate_dir(&self, container: &str, key: &str) {
        if let Some(cache) = &self.inner {
            cache
                .invalidate(&CacheKey {
                    container: container.to_string(),
                    key: key.to_string(),
                    kind: CacheKind::DirExists,
                })
                .await;
        }
    }
}
