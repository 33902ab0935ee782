//! The filesystem-facing adapter trait and a `std::fs`-backed reference implementation
//! of its non-cache duties.
//!
//! Binding this trait to an actual kernel mount (a FUSE session, specifically) is the
//! explicitly out-of-scope external collaborator; this module provides the trait
//! boundary plus everything that does NOT require a kernel binding: directory
//! enumeration and attribute lookup against `origin_dir`, with reads and sizes routed
//! through [`ReadThroughCache`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::cache::ReadThroughCache;
use crate::error::{CacheError, CacheResult};

/// Kind of filesystem entry, as exposed to callers of [`FsAdapter::lookup`] /
/// [`FsAdapter::readdir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file, served through the cache.
    File,
    /// A directory, enumerated and looked up directly against the origin tree.
    Directory,
}

/// Filesystem attributes for a single entry: mode 0444/0555, size from origin,
/// implementation-defined timestamps.
#[derive(Debug, Clone)]
pub struct Attributes {
    /// Whether this entry is a file or directory.
    pub kind: EntryKind,
    /// Byte length (0 for directories).
    pub size: u64,
    /// Unix permission bits: `0o444` for files, `0o555` for directories.
    pub mode: u32,
    /// Best-effort modification time from the origin filesystem.
    pub modified: SystemTime,
}

/// A single entry returned by [`FsAdapter::readdir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not a full path).
    pub name: String,
    /// Whether it is a file or directory.
    pub kind: EntryKind,
}

/// Translates filesystem operations into calls on [`ReadThroughCache`], plus
/// directory enumeration and attribute lookup against the origin tree.
///
/// The mount is read-only: any write, truncate, or create call must be rejected by
/// callers of this trait before it is ever invoked (there is deliberately no
/// `write`/`create` method to call).
pub trait FsAdapter {
    /// Reads `len` bytes at `offset` from the file at `path` (relative to the mount
    /// root), served through the underlying cache.
    fn read(&self, path: &Path, offset: u64, len: usize) -> CacheResult<Vec<u8>>;

    /// Returns attributes for `path`, whether file or directory.
    fn getattr(&self, path: &Path) -> CacheResult<Attributes>;

    /// Resolves `path` to its [`Attributes`], surfacing `NotFound` if absent. Distinct
    /// from `getattr` only in naming (FUSE's `lookup` and `getattr` often share an
    /// implementation); kept separate so a real binding can attach different
    /// lifecycle semantics (e.g. inode refcounting) to each.
    fn lookup(&self, path: &Path) -> CacheResult<Attributes> {
        self.getattr(path)
    }

    /// Lists the immediate children of the directory at `path`.
    fn readdir(&self, path: &Path) -> CacheResult<Vec<DirEntry>>;
}

/// Reference [`FsAdapter`] implementation: reads and sizes go through a shared
/// [`ReadThroughCache`]; directory enumeration and attributes are answered directly
/// against `origin_dir` via `std::fs`, uncached.
#[derive(Debug)]
pub struct PassthroughAdapter {
    cache: std::sync::Arc<ReadThroughCache>,
}

impl PassthroughAdapter {
    /// Wraps a shared cache as a [`FsAdapter`].
    pub fn new(cache: std::sync::Arc<ReadThroughCache>) -> Self {
        PassthroughAdapter { cache }
    }

    fn origin_path(&self, path: &Path) -> PathBuf {
        self.cache.origin_dir().join(path)
    }

    fn io_error(path: &Path, source: std::io::Error) -> CacheError {
        if source.kind() == std::io::ErrorKind::NotFound {
            CacheError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            CacheError::IoOrigin {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

impl FsAdapter for PassthroughAdapter {
    fn read(&self, path: &Path, offset: u64, len: usize) -> CacheResult<Vec<u8>> {
        self.cache.read(path, offset, len)
    }

    fn getattr(&self, path: &Path) -> CacheResult<Attributes> {
        let full = self.origin_path(path);
        let meta = fs::metadata(&full).map_err(|e| Self::io_error(path, e))?;
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if meta.is_dir() {
            Ok(Attributes {
                kind: EntryKind::Directory,
                size: 0,
                mode: 0o555,
                modified,
            })
        } else {
            Ok(Attributes {
                kind: EntryKind::File,
                size: meta.len(),
                mode: 0o444,
                modified,
            })
        }
    }

    fn readdir(&self, path: &Path) -> CacheResult<Vec<DirEntry>> {
        let full = self.origin_path(path);
        let read_dir = fs::read_dir(&full).map_err(|e| Self::io_error(path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| Self::io_error(path, e))?;
            let file_type = entry.file_type().map_err(|e| Self::io_error(path, e))?;
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn make_adapter(origin: &Path, cache_dir: &Path) -> PassthroughAdapter {
        let cache = ReadThroughCache::new(origin, cache_dir, 10, 1_000_000, Duration::ZERO).unwrap();
        PassthroughAdapter::new(Arc::new(cache))
    }

    #[test]
    fn getattr_reports_file_mode_0444_and_size() {
        let origin = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        stdfs::write(origin.path().join("a.txt"), b"hello").unwrap();
        let adapter = make_adapter(origin.path(), cache_dir.path());

        let attrs = adapter.getattr(Path::new("a.txt")).unwrap();
        assert_eq!(attrs.kind, EntryKind::File);
        assert_eq!(attrs.mode, 0o444);
        assert_eq!(attrs.size, 5);
    }

    #[test]
    fn getattr_reports_directory_mode_0555() {
        let origin = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        stdfs::create_dir(origin.path().join("sub")).unwrap();
        let adapter = make_adapter(origin.path(), cache_dir.path());

        let attrs = adapter.getattr(Path::new("sub")).unwrap();
        assert_eq!(attrs.kind, EntryKind::Directory);
        assert_eq!(attrs.mode, 0o555);
    }

    #[test]
    fn getattr_missing_path_is_not_found() {
        let origin = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        let adapter = make_adapter(origin.path(), cache_dir.path());

        let err = adapter.getattr(Path::new("nope")).unwrap_err();
        assert!(matches!(err, CacheError::NotFound { .. }));
    }

    #[test]
    fn readdir_lists_children_mirroring_origin() {
        let origin = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        stdfs::write(origin.path().join("one.txt"), b"1").unwrap();
        stdfs::create_dir(origin.path().join("sub")).unwrap();
        let adapter = make_adapter(origin.path(), cache_dir.path());

        let mut names: Vec<_> = adapter
            .readdir(Path::new(""))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["one.txt".to_string(), "sub".to_string()]);
    }

    #[test]
    fn read_is_routed_through_the_cache() {
        let origin = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        stdfs::write(origin.path().join("a.txt"), b"cached bytes").unwrap();
        let adapter = make_adapter(origin.path(), cache_dir.path());

        let bytes = adapter.read(Path::new("a.txt"), 0, 12).unwrap();
        assert_eq!(bytes, b"cached bytes");
    }

    #[test]
    fn lookup_defaults_to_getattr() {
        let origin = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        stdfs::write(origin.path().join("a.txt"), b"x").unwrap();
        let adapter = make_adapter(origin.path(), cache_dir.path());

        assert_eq!(adapter.lookup(Path::new("a.txt")).unwrap().size, 1);
    }
}
