//! The read-through cache orchestrator.
//!
//! `ReadThroughCache` wires [`crate::digest`], [`crate::store::CacheStore`],
//! [`crate::index::LruIndex`], and [`crate::locks::PathLockStripe`] into the miss →
//! fetch → admit → serve / hit → touch → serve protocol. It holds no kernel-facing
//! state of its own; [`crate::fs_adapter`] is the only thing that calls into it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::digest::digest;
use crate::error::{CacheError, CacheResult};
use crate::index::LruIndex;
use crate::locks::PathLockStripe;
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::store::CacheStore;

/// Orchestrates reads against an origin tree through a bounded, content-addressed
/// cache. Cheap to clone (an `Arc`-backed handle); intended to be shared by every
/// thread the filesystem binding dispatches requests on.
#[derive(Debug)]
pub struct ReadThroughCache {
    origin_dir: PathBuf,
    store: CacheStore,
    index: LruIndex,
    build_locks: PathLockStripe,
    fetch_delay: Duration,
    metrics: CacheMetrics,
}

impl ReadThroughCache {
    /// Builds a cache rooted at `origin_dir`, backed by a [`CacheStore`] at
    /// `cache_dir`, bounded to `max_files` entries and `max_bytes` total size, with a
    /// miss simulating `fetch_delay` of backing-store latency.
    pub fn new(
        origin_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        max_files: usize,
        max_bytes: u64,
        fetch_delay: Duration,
    ) -> CacheResult<Self> {
        Ok(ReadThroughCache {
            origin_dir: origin_dir.into(),
            store: CacheStore::new(cache_dir)?,
            index: LruIndex::new(max_files, max_bytes),
            build_locks: PathLockStripe::new(),
            fetch_delay,
            metrics: CacheMetrics::new(),
        })
    }

    /// The origin directory this cache reads through.
    pub fn origin_dir(&self) -> &Path {
        &self.origin_dir
    }

    /// A snapshot of the ambient request/hit/miss/eviction counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn resolve(&self, origin_path: &Path) -> PathBuf {
        self.origin_dir.join(origin_path)
    }

    /// Returns the byte length of the origin file at `origin_path`. Does not cache;
    /// used by the attribute path.
    #[instrument(skip(self))]
    pub fn size_of(&self, origin_path: &Path) -> CacheResult<u64> {
        let full = self.resolve(origin_path);
        let meta = fs::metadata(&full).map_err(|source| self.origin_error(origin_path, source))?;
        Ok(meta.len())
    }

    fn origin_error(&self, origin_path: &Path, source: std::io::Error) -> CacheError {
        if source.kind() == std::io::ErrorKind::NotFound {
            CacheError::NotFound {
                path: origin_path.to_path_buf(),
            }
        } else {
            CacheError::IoOrigin {
                path: origin_path.to_path_buf(),
                source,
            }
        }
    }

    /// Reads `[offset, offset + len)` of `origin_path`'s content, fetching and
    /// admitting it into the cache first if this is the first read of its bytes.
    ///
    /// On miss: acquires the per-path build lock, reads the whole origin file,
    /// hashes it, writes it to the cache store if not already present, admits it
    /// into the LRU index (evicting as needed), then serves the requested slice.
    /// On hit: the origin file is still read and re-hashed under the build lock (no
    /// path→key memoisation), but the store write is a no-op since the blob already
    /// exists.
    #[instrument(skip(self))]
    pub fn read(&self, origin_path: &Path, offset: u64, len: usize) -> CacheResult<Vec<u8>> {
        // Build lock first, index lock only briefly and later, inside
        // `LruIndex::touch`. No I/O happens while the index lock is held.
        let _build_guard = self.build_locks.lock(origin_path);

        let full = self.resolve(origin_path);
        let bytes = fs::read(&full).map_err(|source| self.origin_error(origin_path, source))?;
        let key = digest(&bytes);

        let was_cached = self.store.exists(&key);
        if !was_cached {
            if !self.fetch_delay.is_zero() {
                std::thread::sleep(self.fetch_delay);
            }
            if let Err(err) = self.store.put(&key, &bytes) {
                // Partial blob cleanup is handled inside CacheStore::put itself; the
                // index must not be touched on a failed write.
                return Err(err);
            }
        }

        let evicted = self.index.touch(key.clone(), bytes.len() as u64);
        if !was_cached {
            self.metrics.record_admission(bytes.len() as u64);
        }
        for victim in evicted {
            let victim_size = self.store.blob_len(&victim).unwrap_or(0);
            match self.store.delete(&victim) {
                Ok(()) => {
                    self.metrics.record_eviction(victim_size);
                    debug!(key = %victim, size = victim_size, "evicted cache blob");
                }
                Err(err) => {
                    // Eviction-delete failures are logged and dropped, never
                    // surfaced: the index has already removed the entry.
                    warn!(key = %victim, error = %err, "failed to delete evicted cache blob");
                }
            }
        }

        drop(_build_guard);

        let mut handle = self.store.open(&key)?;
        let slice = self.store.read_at(&key, &mut handle, offset, len)?;

        if was_cached {
            self.metrics.record_hit(slice.len() as u64);
        } else {
            self.metrics.record_miss(slice.len() as u64);
        }

        Ok(slice)
    }

    /// Test/diagnostic hook mirroring [`LruIndex::snapshot`].
    pub fn index_snapshot(&self) -> (Vec<crate::digest::CacheKey>, u64) {
        self.index.snapshot()
    }

    /// Whether `key` is currently indexed. Exposed for tests asserting that a
    /// completed `read` leaves its key indexed unless concurrently evicted.
    pub fn contains_key(&self, key: &crate::digest::CacheKey) -> bool {
        self.index.contains(key)
    }
}

/// A shared handle to a [`ReadThroughCache`], cheap to clone across reader threads.
pub type SharedCache = Arc<ReadThroughCache>;
