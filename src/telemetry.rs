// src/telemetry.rs
//! Tracing setup and privacy helpers for log lines.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Environment, LogLevel, LoggingConfig};

pub const DEFAULT_LOG_FILTER: &str = "mood_insight_engine=info,warn";
const DEFAULT_LOG_FILE_NAME: &str = "mood-insight-engine.log";
const MAX_LOG_FILES: usize = 5;

// Flushes the background file writer; lives as long as the process.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Install the global subscriber: compact lines in development, JSON in
/// staging/production, plus a daily-rotated plain-text file when
/// `logging.file` is set.
///
/// Filter precedence: `RUST_LOG`, then `logging.level`, then the default.
/// Safe to call more than once (later calls are no-ops), which matters when
/// the hosting runtime already installed a subscriber.
pub fn init_tracing(env: Environment, logging: &LoggingConfig) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let spec = filter_spec(rust_log.as_deref(), logging.level);
    let filter = EnvFilter::try_new(&spec).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let mut file_error = None;
    let (file_layer, guard) = match logging.file.as_deref().map(file_writer) {
        Some(Ok((writer, guard))) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        Some(Err(e)) => {
            file_error = Some(e);
            (None, None)
        }
        None => (None, None),
    };

    let res = match env {
        Environment::Development => tracing_subscriber::registry()
            .with(file_layer)
            .with(filter)
            .with(fmt::layer().compact())
            .try_init(),
        Environment::Staging | Environment::Production => tracing_subscriber::registry()
            .with(file_layer)
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    match res {
        Ok(()) => {
            if let Some(guard) = guard {
                let _ = FILE_GUARD.set(guard);
            }
        }
        Err(_) => tracing::debug!("tracing subscriber already installed; keeping it"),
    }
    if let Some(e) = file_error {
        tracing::warn!(error = %format!("{e:#}"), "file logging disabled");
    }
}

/// Filter directives for the given `RUST_LOG` value and configured level.
fn filter_spec(rust_log: Option<&str>, level: Option<LogLevel>) -> String {
    if let Some(spec) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        return spec.to_string();
    }
    match level {
        // Keep HTTP client internals quiet even at debug.
        Some(l) => format!("{},hyper=warn,reqwest=warn,h2=warn", l.directive()),
        None => DEFAULT_LOG_FILTER.to_string(),
    }
}

/// Non-blocking writer into `<dir>/<file name>.<date>`, rotated daily.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE_NAME);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("opening log file in {}", dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Short stable id for a text, so log lines can be correlated without ever
/// containing the text itself.
pub fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
