//! Tracing subscriber setup.
//!
//! Two layers share one registry:
//! - console: `RUST_LOG` filter (default `info`), RFC 3339 UTC timestamps
//! - file: everything from this crate at `debug`, appended to
//!   `<output>/logs/log-file.log` without ANSI colors

use crate::errors::{BotError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt as tfmt};

pub const LOG_FILE: &str = "log-file.log";

/// Open (creating if needed) the append-mode log file inside `log_dir`.
pub fn open_log_file(log_dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    let (path, file) = open_log_file(log_dir)?;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(console_filter);

    let file_layer = tfmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new("info,rpa_news=debug"));

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| BotError::Environment(format!("logging: {e}")))?;
    Ok(path)
}
