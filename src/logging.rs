//! Logging setup: console plus a daily rotated file.

use std::path::Path;

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

const LOG_FILE_PREFIX: &str = "flight-bot";
const MAX_LOG_FILES: usize = 7;

/// Used when `RUST_LOG` is unset. Request spans of the HTTP surface are emitted by tower-http.
pub const DEFAULT_FILTER: &str = "flight_bot=info,tower_http=info";

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped, so keep it alive until exit.
pub fn setup_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let (file_writer, guard) = file_writer(&config.logs_path)?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Failed to install log subscriber: {e}"),
        })?;

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn file_writer(logs_path: &Path) -> Result<(NonBlocking, WorkerGuard), AppError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(logs_path)
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Cannot write logs to '{}': {e}", logs_path.display()),
        })?;

    Ok(tracing_appender::non_blocking(appender))
}
