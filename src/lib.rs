#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Module Map
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`digest`] | Content hashing: `bytes -> CacheKey` |
//! | [`store`] | On-disk, content-addressed blob store |
//! | [`index`] | In-memory dual-bounded LRU index |
//! | [`locks`] | Per-origin-path build lock (keyed mutex stripe) |
//! | [`cache`] | `ReadThroughCache`: the read-path orchestrator |
//! | [`fs_adapter`] | Filesystem-facing trait + `std::fs` reference implementation |
//! | [`config`] | Layered CLI/TOML/default configuration |
//! | [`metrics`] | Ambient request/hit/miss/eviction counters |
//! | [`error`] | The typed error hierarchy surfaced by the core |
//!
//! ## Minimal Example
//!
//! ```no_run
//! use cachefs::cache::ReadThroughCache;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let cache = ReadThroughCache::new(
//!     "/slow/origin",
//!     "/fast/cache",
//!     10,               // max_files
//!     100 * 1024,       // max_bytes
//!     Duration::from_millis(500),
//! ).unwrap();
//!
//! let bytes = cache.read(Path::new("some/file.txt"), 0, 4096);
//! ```
//!
//! On first read, `some/file.txt`'s bytes are hashed and copied into the cache store;
//! subsequent reads of identical content, from this path or any other, are served
//! from the cache. See [`index::LruIndex`] for the eviction policy and [`cache`] for
//! the full miss/hit protocol.

/// Content hashing (`bytes -> CacheKey`).
///
/// A single pure function maps a byte buffer to a fixed-width, lowercase-hex digest
/// used as the cache store's sole naming scheme.
pub mod digest;

/// The typed error hierarchy surfaced by the cache core.
pub mod error;

/// Intrusive doubly linked list backing the LRU recency order.
///
/// **Note**: internal infrastructure; use [`index::LruIndex`] instead of this module
/// directly. It performs unsafe raw-pointer operations that require careful invariant
/// maintenance.
mod list;

/// On-disk, content-addressed blob store.
pub mod store;

/// The in-memory, dual-bounded LRU index.
pub mod index;

/// Per-origin-path build lock (a stripe of mutexes keyed by path hash).
pub mod locks;

/// Ambient in-process metrics (requests, hits, misses, evictions, bytes).
pub mod metrics;

/// The read-through cache orchestrator: the miss/hit read-path protocol.
pub mod cache;

/// The filesystem-facing adapter trait and a `std::fs` reference implementation.
pub mod fs_adapter;

/// Layered configuration: CLI flags over an optional TOML file over defaults.
pub mod config;

pub use cache::ReadThroughCache;
pub use digest::{digest, CacheKey};
pub use error::{CacheError, CacheResult};
pub use fs_adapter::{Attributes, DirEntry, EntryKind, FsAdapter, PassthroughAdapter};
pub use index::LruIndex;
pub use store::CacheStore;
