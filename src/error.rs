//! The typed error hierarchy surfaced by the cache core.
//!
//! Every fallible operation in [`crate::store`], [`crate::index`], and [`crate::cache`]
//! returns [`CacheError`] so that [`crate::fs_adapter`] can match on kind (ENOENT vs EIO)
//! without parsing strings.

use std::io;
use std::path::PathBuf;

use crate::digest::CacheKey;

/// Errors surfaced by the read-through cache core.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The origin path does not exist. Surfaced to the filesystem as ENOENT.
    #[error("origin path not found: {path}")]
    NotFound {
        /// The origin-relative path that could not be found.
        path: PathBuf,
    },

    /// Reading the origin file failed for a reason other than non-existence.
    /// Surfaced to the filesystem as EIO.
    #[error("failed to read origin path {path}: {source}")]
    IoOrigin {
        /// The origin-relative path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing a newly admitted blob to the cache store failed. Any partially written
    /// blob is removed before this error is returned; the index is not touched.
    /// Surfaced to the filesystem as EIO.
    #[error("failed to write cache blob {key}: {source}")]
    IoCacheWrite {
        /// The key of the blob that failed to write.
        key: CacheKey,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading an indexed blob failed even though its key is still in the index
    /// (indexed-implies-readable has been violated) and is logged as such in
    /// addition to being surfaced to the filesystem as EIO.
    #[error("failed to read cache blob {key}: {source}")]
    IoCacheRead {
        /// The key of the blob that failed to read.
        key: CacheKey,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Deleting an evicted blob failed. Logged, never surfaced: the index has
    /// already dropped the entry by the time this happens.
    #[error("failed to delete evicted cache blob {key}: {source}")]
    IoCacheDeleteOnEvict {
        /// The key of the blob that failed to delete.
        key: CacheKey,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Configuration failed to load or validate (ambient: the bootstrap/config layer,
    /// not part of the core read path).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for results produced by the cache core.
pub type CacheResult<T> = Result<T, CacheError>;

impl CacheError {
    /// Whether this error should be surfaced to the filesystem caller, as opposed to
    /// being logged and dropped (eviction-delete failures are never surfaced).
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, CacheError::IoCacheDeleteOnEvict { .. })
    }
}
