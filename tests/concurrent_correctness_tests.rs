//! Concurrent correctness tests for the read-through cache.
//!
//! These tests validate that `ReadThroughCache` maintains correct eviction and
//! single-admission semantics while being driven from multiple threads.
//!
//! ## Test Strategy
//!
//! Unlike throughput-oriented stress tests, these focus on:
//! - Verifying the dual (count, byte) bound is never exceeded under concurrent reads
//! - Verifying concurrent first-reads of the same path admit exactly once
//! - Verifying metrics counters add up under concurrent access
//!
//! ## Segments
//!
//! 1. **Single admission under contention**
//! 2. **Bound invariants under concurrent mixed reads**
//! 3. **Metrics consistency under concurrent access**

use cachefs::cache::ReadThroughCache;
use cachefs::digest::digest;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn write_origin(dir: &Path, rel: &str, contents: &[u8]) {
    let full = dir.join(rel);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, contents).unwrap();
}

// ============================================================================
// SEGMENT 1: SINGLE ADMISSION UNDER CONTENTION
// ============================================================================

#[test]
fn many_threads_reading_the_same_new_path_admit_exactly_once() {
    let origin = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_origin(origin.path(), "shared.bin", b"identical bytes read by every thread");
    let cache = Arc::new(ReadThroughCache::new(
        origin.path(),
        cache_dir.path(),
        5,
        1_000_000,
        Duration::from_millis(5),
    ).unwrap());

    let n = 16;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.read(Path::new("shared.bin"), 0, 37).unwrap()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), b"identical bytes read by every thread");
    }

    let (keys, _) = cache.index_snapshot();
    assert_eq!(keys.len(), 1, "concurrent first-reads of one path must admit only once");
    assert_eq!(cache.metrics().bytes_written, 37, "the blob must be written exactly once");
}

#[test]
fn concurrent_reads_of_distinct_paths_each_admit_independently() {
    let origin = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    for i in 0..8 {
        write_origin(origin.path(), &format!("f{i}.bin"), format!("contents-{i}").as_bytes());
    }
    let cache = Arc::new(ReadThroughCache::new(
        origin.path(),
        cache_dir.path(),
        20,
        1_000_000,
        Duration::ZERO,
    ).unwrap());

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let name = format!("f{i}.bin");
                let expected = format!("contents-{i}");
                let bytes = cache.read(Path::new(&name), 0, expected.len()).unwrap();
                assert_eq!(bytes, expected.as_bytes());
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let (keys, _) = cache.index_snapshot();
    assert_eq!(keys.len(), 8);
}

// ============================================================================
// SEGMENT 2: BOUND INVARIANTS UNDER CONCURRENT MIXED READS
// ============================================================================

#[test]
fn count_bound_holds_under_concurrent_reads_of_many_distinct_files() {
    let origin = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    for i in 0..40 {
        write_origin(origin.path(), &format!("n{i}.bin"), format!("n{i}").as_bytes());
    }
    let max_files = 5;
    let cache = Arc::new(ReadThroughCache::new(
        origin.path(),
        cache_dir.path(),
        max_files,
        1_000_000,
        Duration::ZERO,
    ).unwrap());

    let barrier = Arc::new(Barrier::new(10));
    let handles: Vec<_> = (0..10)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..4 {
                    let idx = t * 4 + i;
                    let name = format!("n{idx}.bin");
                    let expected = format!("n{idx}");
                    let bytes = cache.read(Path::new(&name), 0, expected.len()).unwrap();
                    assert_eq!(bytes, expected.as_bytes());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let (keys, total_bytes) = cache.index_snapshot();
    assert!(keys.len() <= max_files, "count bound must never be exceeded");
    assert!(total_bytes <= 1_000_000);
}

#[test]
fn byte_bound_holds_under_concurrent_reads() {
    let origin = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    for i in 0..20 {
        write_origin(origin.path(), &format!("b{i}.bin"), &vec![b'a'; 50]);
    }
    let max_bytes = 300;
    let cache = Arc::new(ReadThroughCache::new(
        origin.path(),
        cache_dir.path(),
        100,
        max_bytes,
        Duration::ZERO,
    ).unwrap());

    let barrier = Arc::new(Barrier::new(20));
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let name = format!("b{i}.bin");
                cache.read(Path::new(&name), 0, 50).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let (_, total_bytes) = cache.index_snapshot();
    assert!(total_bytes <= max_bytes, "byte bound must never be exceeded");
}

// ============================================================================
// SEGMENT 3: METRICS CONSISTENCY UNDER CONCURRENT ACCESS
// ============================================================================

#[test]
fn request_count_matches_total_reads_issued_across_threads() {
    let origin = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_origin(origin.path(), "m.bin", b"metrics payload");
    let cache = Arc::new(ReadThroughCache::new(
        origin.path(),
        cache_dir.path(),
        10,
        1_000_000,
        Duration::ZERO,
    ).unwrap());

    let reads_per_thread = 25;
    let n_threads = 6;
    let barrier = Arc::new(Barrier::new(n_threads));
    let handles: Vec<_> = (0..n_threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..reads_per_thread {
                    cache.read(Path::new("m.bin"), 0, 16).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snapshot = cache.metrics();
    assert_eq!(snapshot.requests, (reads_per_thread * n_threads) as u64);
    assert_eq!(snapshot.hits + snapshot.misses, snapshot.requests);
    assert!(cache.contains_key(&digest(b"metrics payload")));
}
