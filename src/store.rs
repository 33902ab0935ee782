//! On-disk, content-addressed blob store.
//!
//! [`CacheStore`] is deliberately "dumb": a flat directory of files named by their
//! [`CacheKey`], with no index of its own. Keeping it dumb is what lets
//! [`crate::index::LruIndex`] be the single source of truth for invariant 3 (every
//! indexed key has a readable blob), since the store never needs to be consulted to
//! find out what is cached, only to read or write a specific key's bytes.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::digest::CacheKey;
use crate::error::{CacheError, CacheResult};

/// Process-wide counter ensuring two concurrent writers never stage to the same
/// temporary filename, even when they are writing the same key (distinct origin
/// paths with identical content hash to the same key and race past the per-path
/// build lock, which is keyed by path, not by key).
static TMP_NONCE: AtomicU64 = AtomicU64::new(0);

/// Unix file mode for cache blobs: world-readable, owner-writable.
#[cfg(unix)]
const BLOB_MODE: u32 = 0o644;

/// A handle to an open blob, positioned for reads via [`CacheStore::read_at`].
#[derive(Debug)]
pub struct BlobHandle {
    file: File,
}

/// A flat, content-addressed directory of cache blobs.
///
/// All mutation (`put`, `delete`) is routed through this type; no other component
/// touches files under `root` directly.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Opens (creating if necessary) a cache store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::IoCacheWrite {
            key: CacheKey::from_raw_for_error(&root),
            source,
        })?;
        Ok(CacheStore { root })
    }

    fn blob_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_hex())
    }

    fn tmp_path(&self, key: &CacheKey) -> PathBuf {
        let nonce = TMP_NONCE.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{}.tmp-{}-{}", key.as_hex(), std::process::id(), nonce))
    }

    /// Returns whether a blob for `key` currently exists in the store.
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.blob_path(key).is_file()
    }

    /// Returns the on-disk length of the blob for `key`, if it exists.
    pub fn blob_len(&self, key: &CacheKey) -> Option<u64> {
        fs::metadata(self.blob_path(key)).ok().map(|m| m.len())
    }

    /// Writes `bytes` to the blob named by `key`.
    ///
    /// Content is staged to a temporary sibling file and atomically renamed into
    /// place, so a concurrent reader never observes a partially written blob. If a
    /// blob already exists under `key` it is left untouched (equal keys imply equal
    /// bytes, so re-writing would be redundant).
    pub fn put(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        if self.exists(key) {
            return Ok(());
        }

        let tmp = self.tmp_path(key);
        let write_result = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(BLOB_MODE))?;
            }
            Ok(())
        })();

        if let Err(source) = write_result {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::IoCacheWrite {
                key: key.clone(),
                source,
            });
        }

        if let Err(source) = fs::rename(&tmp, self.blob_path(key)) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::IoCacheWrite {
                key: key.clone(),
                source,
            });
        }

        Ok(())
    }

    /// Opens the blob for `key` for positional reads.
    pub fn open(&self, key: &CacheKey) -> CacheResult<BlobHandle> {
        let file = File::open(self.blob_path(key)).map_err(|source| CacheError::IoCacheRead {
            key: key.clone(),
            source,
        })?;
        Ok(BlobHandle { file })
    }

    /// Reads up to `len` bytes starting at `offset` from an open blob handle.
    ///
    /// A short read at end-of-file is not an error; the returned `Vec` is simply
    /// shorter than `len`.
    pub fn read_at(&self, key: &CacheKey, handle: &mut BlobHandle, offset: u64, len: usize) -> CacheResult<Vec<u8>> {
        handle
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| CacheError::IoCacheRead {
                key: key.clone(),
                source,
            })?;

        let mut buf = vec![0u8; len];
        let mut total = 0;
        loop {
            if total == buf.len() {
                break;
            }
            match handle.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(CacheError::IoCacheRead {
                        key: key.clone(),
                        source,
                    });
                }
            }
        }
        buf.truncate(total);
        Ok(buf)
    }

    /// Deletes the blob named by `key`. A missing file is not an error.
    pub fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        match fs::remove_file(self.blob_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::IoCacheDeleteOnEvict {
                key: key.clone(),
                source,
            }),
        }
    }

    /// The root directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CacheKey {
    /// Stand-in key used only for error reporting when a store-level failure (e.g.
    /// creating the root directory) happens before any real key is involved.
    fn from_raw_for_error(path: &Path) -> CacheKey {
        crate::digest::digest(path.to_string_lossy().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn put_then_open_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"hello world");

        store.put(&key, b"hello world").unwrap();
        assert!(store.exists(&key));

        let mut handle = store.open(&key).unwrap();
        let bytes = store.read_at(&key, &mut handle, 0, 11).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn short_read_at_eof_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"short");
        store.put(&key, b"short").unwrap();

        let mut handle = store.open(&key).unwrap();
        let bytes = store.read_at(&key, &mut handle, 2, 100).unwrap();
        assert_eq!(bytes, b"ort");
    }

    #[test]
    fn concurrent_puts_of_the_same_key_do_not_collide_on_tmp_path() {
        // Reproduces the race between distinct origin paths that hash to the same
        // content key: the build lock is keyed by path, not by key, so two threads
        // can call `put` for the same key at the same time. Each must stage to its
        // own temp file; neither rename may observe the other's tmp file already
        // moved away.
        let dir = tempdir().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()).unwrap());
        let key = crate::digest::digest(b"raced content");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || store.put(&key, b"raced content"))
            })
            .collect();

        for h in handles {
            h.join().unwrap().unwrap();
        }

        assert!(store.exists(&key));
        let mut handle = store.open(&key).unwrap();
        assert_eq!(store.read_at(&key, &mut handle, 0, 14).unwrap(), b"raced content");
    }

    #[test]
    fn put_is_idempotent_for_existing_key() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"data");
        store.put(&key, b"data").unwrap();
        // Same key implies same bytes; a second put must not error or corrupt the blob.
        store.put(&key, b"data").unwrap();

        let mut handle = store.open(&key).unwrap();
        assert_eq!(store.read_at(&key, &mut handle, 0, 4).unwrap(), b"data");
    }

    #[test]
    fn delete_missing_blob_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"never written");
        store.delete(&key).unwrap();
    }

    #[test]
    fn delete_removes_blob_file() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"to be deleted");
        store.put(&key, b"bytes").unwrap();
        assert!(store.exists(&key));
        store.delete(&key).unwrap();
        assert!(!store.exists(&key));
    }

    #[test]
    fn open_missing_blob_errors() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"missing");
        assert!(store.open(&key).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn blob_file_mode_is_0644() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path()).unwrap();
        let key = crate::digest::digest(b"mode check");
        store.put(&key, b"x").unwrap();

        let meta = fs::metadata(store.blob_path(&key)).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, BLOB_MODE);
    }
}
