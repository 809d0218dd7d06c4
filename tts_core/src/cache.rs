//! In-memory audio cache: fingerprint -> generated file.
//!
//! The cache only tracks metadata. It never deletes audio files, and an entry
//! whose file has disappeared from disk is evicted the next time it is looked
//! up. Capacity is bounded with least-recently-used eviction.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::fingerprint::CacheKey;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub file_path: PathBuf,
    /// Backend that produced the file.
    pub engine: String,
}

pub struct AudioCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl AudioCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // No code path panics while holding the lock, so a poisoned guard still
    // holds a consistent map.
    fn entries(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`. An entry whose file no longer exists is removed and
    /// reported as a miss. The filesystem check runs outside the lock.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries().get(key).cloned()?;
        if entry.file_path.is_file() {
            return Some(entry);
        }
        self.evict_if_unchanged(key, &entry.file_path);
        None
    }

    // Only evict if no `put` replaced the entry since it was read.
    fn evict_if_unchanged(&self, key: &CacheKey, stale_path: &Path) -> bool {
        let mut entries = self.entries();
        if entries.peek(key).is_some_and(|e| e.file_path == stale_path) {
            entries.pop(key);
            debug!(
                cache_key = ?key,
                file = %stale_path.display(),
                "Evicting cache entry whose audio file is gone"
            );
            return true;
        }
        false
    }

    /// Insert or silently overwrite.
    pub fn put(&self, key: CacheKey, file_path: impl Into<PathBuf>, engine: impl Into<String>) {
        let entry = CacheEntry {
            key,
            file_path: file_path.into(),
            engine: engine.into(),
        };
        self.entries().put(key, entry);
    }

    /// Drop every entry. Files on disk are left alone.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }
}

impl Default for AudioCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
