//! Process bootstrap: parses configuration, initializes structured logging,
//! constructs the cache and reference adapter, and waits for a termination signal
//! before exiting.
//!
//! Mounting `FsAdapter` onto an actual kernel FUSE session is left to an external
//! layer; this binary's responsibility ends at a clean, logged shutdown of the
//! cache core once a signal arrives.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use cachefs::cache::ReadThroughCache;
use cachefs::config::{CliArgs, Config};
use cachefs::fs_adapter::{FsAdapter, PassthroughAdapter};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_termination_signal(_signum: libc::c_int) {
    // Signal-safe: only sets an atomic flag, no allocation or logging here.
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    // SAFETY: `handle_termination_signal` only performs an atomic store, which is
    // async-signal-safe; `libc::signal` itself requires no further preconditions here.
    unsafe {
        libc::signal(libc::SIGINT, handle_termination_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_termination_signal as libc::sighandler_t);
    }
}

fn init_logging(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .try_init();
}

fn run() -> Result<(), String> {
    let args = CliArgs::parse();
    let config = Config::resolve(args).map_err(|e| e.to_string())?;

    init_logging(&config.log_level);
    info!(
        mountpoint = %config.mountpoint.display(),
        origin_dir = %config.origin_dir.display(),
        cache_dir = %config.cache_dir.display(),
        max_files = config.max_files,
        max_bytes = config.max_bytes,
        fetch_delay_ms = config.fetch_delay_ms,
        "starting cachefs"
    );

    config.validate_and_prepare().map_err(|e| e.to_string())?;

    let cache = Arc::new(
        ReadThroughCache::new(
            &config.origin_dir,
            &config.cache_dir,
            config.max_files,
            config.max_bytes,
            Duration::from_millis(config.fetch_delay_ms),
        )
        .map_err(|e| e.to_string())?,
    );
    let adapter = PassthroughAdapter::new(Arc::clone(&cache));

    // Sanity check: the origin tree's root must itself be listable before we consider
    // the mount ready, since readdir/getattr are served directly against it.
    if let Err(e) = adapter.getattr(std::path::Path::new("")) {
        return Err(format!("origin_dir is not accessible: {e}"));
    }

    install_signal_handlers();
    info!("cachefs ready; waiting for a termination signal (binding this adapter to an actual kernel mount is left to the external FUSE layer)");

    while !SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    let metrics = cache.metrics();
    info!(
        requests = metrics.requests,
        hits = metrics.hits,
        misses = metrics.misses,
        evictions = metrics.evictions,
        bytes_served = metrics.bytes_served,
        bytes_written = metrics.bytes_written,
        bytes_evicted = metrics.bytes_evicted,
        "shutdown signal received, exiting cleanly"
    );

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!(%message, "cachefs failed to start");
            ExitCode::FAILURE
        }
    }
}
