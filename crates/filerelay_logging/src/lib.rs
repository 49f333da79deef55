//! Logging setup for the filerelay binary.
//!
//! Two layers: a daily log file (no ANSI) and stderr. Every run is a single
//! batch pass, so the file log is the record an operator reads after a
//! scheduled invocation.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "filerelay=info,filerelay_remote=info,filerelay_records=info";
/// Daily files kept in the log directory; older ones are removed on rotation.
const MAX_LOG_FILES: usize = 14;

/// Logging configuration for a filerelay run.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only.
    pub verbose: bool,
    /// Overrides the default `<home>/logs` directory.
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a daily log file and stderr output.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the whole run.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir(),
    };
    let (file_writer, guard) = file_writer(&log_dir, config.app_name)?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Non-blocking writer over `<dir>/<app_name>.<date>.log`.
fn file_writer(dir: &Path, app_name: &str) -> Result<(NonBlocking, WorkerGuard)> {
    ensure_dir(dir)?;
    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Resolve the filerelay home directory.
///
/// Priority:
/// 1) FILERELAY_HOME
/// 2) ~/.filerelay
/// 3) ./.filerelay
pub fn filerelay_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("FILERELAY_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .map(|home| home.join(".filerelay"))
        .unwrap_or_else(|| PathBuf::from(".").join(".filerelay"))
}

/// Get the logs directory: ~/.filerelay/logs
pub fn logs_dir() -> PathBuf {
    filerelay_home().join("logs")
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
