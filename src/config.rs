//! Layered configuration: CLI flags overlay an optional TOML file, which overlays
//! built-in defaults. CLI parsing uses `clap`'s derive API; the optional file overlay
//! is plain `serde`-derived TOML.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::{CacheError, CacheResult};

const DEFAULT_MAX_FILES: usize = 10;
const DEFAULT_MAX_BYTES: u64 = 100 * 1024; // 100 KiB
const DEFAULT_FETCH_DELAY_MS: u64 = 500;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Fully resolved configuration for a single cachefs mount.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where to expose the filesystem.
    pub mountpoint: PathBuf,
    /// Root of the backing (slow) tree.
    pub origin_dir: PathBuf,
    /// Root of the on-disk cache store.
    pub cache_dir: PathBuf,
    /// Upper bound on the number of indexed cache entries.
    pub max_files: usize,
    /// Upper bound on total indexed bytes.
    pub max_bytes: u64,
    /// Simulated backing-store latency applied on every cache miss.
    pub fetch_delay_ms: u64,
    /// Log verbosity, overridable via `RUST_LOG`.
    pub log_level: String,
}

/// CLI flags, parsed with `clap`'s derive API.
#[derive(Debug, Parser)]
#[command(name = "cachefs", about = "Read-through, content-addressed cache over a slow origin tree")]
pub struct CliArgs {
    /// Mountpoint exposing the cached view of `origin_dir`.
    #[arg(long)]
    pub mountpoint: Option<PathBuf>,

    /// Root of the backing directory tree.
    #[arg(long)]
    pub origin_dir: Option<PathBuf>,

    /// Root directory for the on-disk cache store.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cached entries.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Maximum total cached bytes.
    #[arg(long)]
    pub max_bytes: Option<u64>,

    /// Simulated miss latency in milliseconds.
    #[arg(long)]
    pub fetch_delay_ms: Option<u64>,

    /// Log level (falls back to `RUST_LOG`, then to `info`).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Optional TOML file whose values overlay the built-in defaults, and are in
    /// turn overlaid by any CLI flag given above.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// The subset of [`Config`] that may be supplied via a TOML file. Every field is
/// optional: an absent field simply falls through to the built-in default (or a CLI
/// override, which takes precedence over both).
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    mountpoint: Option<PathBuf>,
    origin_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    max_files: Option<usize>,
    max_bytes: Option<u64>,
    fetch_delay_ms: Option<u64>,
    log_level: Option<String>,
}

impl Config {
    /// Resolves a full [`Config`] from parsed CLI args, loading and overlaying
    /// `--config <path>` if present, then falling back to built-in defaults for
    /// anything neither source specified.
    pub fn resolve(args: CliArgs) -> CacheResult<Config> {
        let file = match &args.config {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };

        let mountpoint = args
            .mountpoint
            .or(file.mountpoint)
            .ok_or_else(|| CacheError::InvalidConfig("mountpoint is required".into()))?;
        let origin_dir = args
            .origin_dir
            .or(file.origin_dir)
            .ok_or_else(|| CacheError::InvalidConfig("origin_dir is required".into()))?;
        let cache_dir = args
            .cache_dir
            .or(file.cache_dir)
            .ok_or_else(|| CacheError::InvalidConfig("cache_dir is required".into()))?;

        Ok(Config {
            mountpoint,
            origin_dir,
            cache_dir,
            max_files: args.max_files.or(file.max_files).unwrap_or(DEFAULT_MAX_FILES),
            max_bytes: args.max_bytes.or(file.max_bytes).unwrap_or(DEFAULT_MAX_BYTES),
            fetch_delay_ms: args
                .fetch_delay_ms
                .or(file.fetch_delay_ms)
                .unwrap_or(DEFAULT_FETCH_DELAY_MS),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Validates that `mountpoint` and `cache_dir` exist or can be created, and that
    /// `origin_dir` already exists (it is read-only backing storage, so it cannot be
    /// conjured into existence).
    pub fn validate_and_prepare(&self) -> CacheResult<()> {
        if !self.origin_dir.is_dir() {
            return Err(CacheError::InvalidConfig(format!(
                "origin_dir {} does not exist or is not a directory",
                self.origin_dir.display()
            )));
        }
        std::fs::create_dir_all(&self.cache_dir).map_err(|source| CacheError::IoCacheWrite {
            key: crate::digest::digest(self.cache_dir.to_string_lossy().as_bytes()),
            source,
        })?;
        std::fs::create_dir_all(&self.mountpoint).map_err(|source| {
            CacheError::InvalidConfig(format!(
                "mountpoint {} could not be created: {source}",
                self.mountpoint.display()
            ))
        })?;
        Ok(())
    }
}

fn load_file_config(path: &Path) -> CacheResult<FileConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        CacheError::InvalidConfig(format!("failed to read config file {}: {source}", path.display()))
    })?;
    toml::from_str(&text)
        .map_err(|e| CacheError::InvalidConfig(format!("failed to parse config file {}: {e}", path.display())))
}
