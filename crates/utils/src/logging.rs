//! provides logging helpers

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

use crate::LoggingError;

fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber, writing to stderr
pub fn init() -> Result<(), LoggingError> {
    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    registry().with(fmt_layer).try_init()?;
    Ok(())
}

/// initiate the global tracing subscriber, writing to stderr and to a
/// daily rolling file.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_with_file<P: AsRef<Path>>(log_file: P) -> Result<WorkerGuard, LoggingError> {
    let log_file = log_file.as_ref();
    let file_name = log_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoggingError::NoFileName(log_file.to_path_buf()))?;
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(3)
        .build(dir)?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let stderr_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let file_layer = layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    registry().with(stderr_layer).with(file_layer).try_init()?;
    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn file_logging_rejects_path_without_file_name() {
        let err = init_with_file("/").expect_err("root has no file name");
        match err {
            LoggingError::NoFileName(path) => assert_eq!(path, PathBuf::from("/")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn file_logging_writes_into_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_with_file(dir.path().join("reporter.log")).unwrap();
        tracing::info!(msg = "file logging ready");
        drop(guard);

        let created = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().starts_with("reporter.log"));
        assert!(created);
    }
}
