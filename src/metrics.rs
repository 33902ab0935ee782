//! Ambient in-process metrics for the cache core.
//!
//! Tracks the counters the adapter layer needs for diagnostics: request/hit/miss
//! counts, bytes served and written, and eviction counts and bytes. Counters are
//! recorded on the hot path and reported as a plain snapshot struct, backed by
//! atomics since `ReadThroughCache` is shared across reader threads rather than
//! owned behind a single `&mut self`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters recorded on every cache read and eviction.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    bytes_served: AtomicU64,
    bytes_written: AtomicU64,
    evictions: AtomicU64,
    bytes_evicted: AtomicU64,
}

/// A point-in-time copy of [`CacheMetrics`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total `read` calls served (hits + misses).
    pub requests: u64,
    /// Reads that found the content already cached.
    pub hits: u64,
    /// Reads that required a fetch from origin.
    pub misses: u64,
    /// Total bytes returned to callers across all reads.
    pub bytes_served: u64,
    /// Total bytes written into the cache store across all admissions.
    pub bytes_written: u64,
    /// Total number of evicted entries.
    pub evictions: u64,
    /// Total bytes freed by eviction.
    pub bytes_evicted: u64,
}

impl CacheMetrics {
    /// Creates a fresh, zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cache hit: `bytes` bytes were served from an already-cached blob.
    pub fn record_hit(&self, bytes: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a cache miss: `bytes` bytes were served after a fetch+admit.
    pub fn record_miss(&self, bytes: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records that `bytes` bytes were written to the cache store on admission.
    pub fn record_admission(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records that one entry of `bytes` bytes was evicted.
    pub fn record_eviction(&self, bytes: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.bytes_evicted.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot of all counters for reporting.
    ///
    /// Individual fields are read independently (no global lock), so under concurrent
    /// mutation the snapshot may not be perfectly atomic across fields; acceptable for
    /// diagnostics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            bytes_evicted: self.bytes_evicted.load(Ordering::Relaxed),
        }
    }
}
