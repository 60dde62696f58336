// Subscriber setup: stderr always, plus an append-only file when LOG_FILE is set.

use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

pub const LOG_FILE_ENV: &str = "LOG_FILE";

pub struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Split a log path into its directory ("." when bare) and file name.
pub fn split_log_path(path: &Path) -> Option<(PathBuf, String)> {
    let name = path.file_name()?.to_str()?.to_string();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}

/// Appender that writes to exactly `path`, never rotating.
pub fn file_writer(path: &Path) -> anyhow::Result<RollingFileAppender> {
    let (dir, name) = split_log_path(path)
        .ok_or_else(|| anyhow::anyhow!("{} {:?} has no file name", LOG_FILE_ENV, path))?;
    std::fs::create_dir_all(&dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir)
        .map_err(|e| anyhow::anyhow!("open log file {:?}: {}", path, e))
}

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut file_error = None;
    let file_layer = std::env::var_os(LOG_FILE_ENV)
        .filter(|v| !v.is_empty())
        .and_then(|v| match file_writer(Path::new(&v)) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTimer)
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Err(e) => {
                file_error = Some(e);
                None
            }
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(error = %format!("{:#}", e), "log file disabled; logging to stderr only");
    }
}
