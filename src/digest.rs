//! Content hashing.
//!
//! A single pure function, [`digest`], maps a byte buffer to a [`CacheKey`]: a fixed-width,
//! lowercase-hex content hash safe to use as a cache directory filename. Two files with
//! identical bytes produce identical keys; the content hash is the sole naming scheme in
//! the on-disk cache store (see [`crate::store::CacheStore`]).

use std::fmt;

/// A fixed-width content hash, hex-encoded, used as a cache blob's filename.
///
/// Deliberately opaque beyond its string representation: nothing in this crate reasons
/// about the hash bytes themselves, only about key equality and its use as a path
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the lowercase hex representation of this key, as used for filenames.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes the content hash of `bytes`, returning a [`CacheKey`].
///
/// Uses BLAKE3 (a 256-bit cryptographic hash) for collision resistance across
/// practical content sets. The hash is used purely as a cache key, not as a security
/// primitive, see the crate's Non-goals around cryptographic integrity.
pub fn digest(bytes: &[u8]) -> CacheKey {
    let hash = blake3::hash(bytes);
    CacheKey(hash.to_hex().to_ascii_lowercase())
}
