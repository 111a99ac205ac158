//! Tracing subscriber setup
//!
//! Events go to stderr, filtered by `MACAD_LOG` (an `EnvFilter` directive,
//! default `warn`) unless the caller passes an explicit level. Setting
//! `MACAD_LOG_FILE=1` also appends plain-text events to
//! `~/Library/Logs/macad/macad.log`, rotated to `macad.log.bak` once it
//! grows past 10 MiB.

use crate::constants::{ENV_LOG, ENV_LOG_FILE, MAX_LOG_BYTES};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber
///
/// `level` (from `--log-level`) takes precedence over `MACAD_LOG`. Calling
/// this twice is harmless; the second call is ignored.
pub fn init(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
        None => EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    };

    let file_layer = if file_logging_enabled() {
        log_file().map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
        })
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();
}

fn file_logging_enabled() -> bool {
    std::env::var(ENV_LOG_FILE)
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// `~/Library/Logs/macad/macad.log`, or `./macad.log` without a home
fn log_path() -> PathBuf {
    let dir = std::env::var("HOME")
        .map(|home| PathBuf::from(home).join("Library").join("Logs").join("macad"))
        .unwrap_or_else(|_| PathBuf::from("."));
    dir.join("macad.log")
}

fn log_file() -> Option<File> {
    let path = log_path();
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    rotate_if_needed(&path, MAX_LOG_BYTES);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("macad: cannot open log file {}: {}", path.display(), err);
            None
        }
    }
}

/// Move `path` to `<path>.bak` once it exceeds `max_bytes`
fn rotate_if_needed(path: &Path, max_bytes: u64) {
    if let Ok(meta) = fs::metadata(path) {
        if meta.len() > max_bytes {
            let backup = path.with_extension("log.bak");
            let _ = fs::remove_file(&backup);
            let _ = fs::rename(path, &backup);
        }
    }
}
