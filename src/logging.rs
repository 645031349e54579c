use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "tutor.log";

/// Keeps the non-blocking file writer alive; dropping it flushes the log.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber: stdout always, plus a daily rolling file
/// when `file_dir` is set and can be created.
pub fn init_tracing(config: &LoggingConfig) -> Option<FileLogGuard> {
    let env_filter = build_filter(&config.level);
    let stdout_layer = fmt::layer().with_target(true);

    let file = config
        .file_dir
        .as_deref()
        .and_then(|dir| match file_writer(dir) {
            Ok(writer) => Some(writer),
            Err(err) => {
                eprintln!("failed to create log directory {}: {err}", dir.display());
                None
            }
        });
    let (file_writer, guard) = match file {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = config.file_dir.as_deref().filter(|_| guard.is_some()) {
        tracing::info!(log_dir = %dir.display(), "file logging enabled");
    }
    guard.map(|guard| FileLogGuard { _guard: guard })
}

/// Parses the level directive, falling back to `info` when it is invalid.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}
