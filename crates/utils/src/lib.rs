pub mod logging;
pub mod version;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Log file path `{}` has no file name", .0.display())]
    NoFileName(PathBuf),

    #[error("Failed to create rolling file appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}
