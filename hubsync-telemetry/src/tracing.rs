//! Tracing subscriber initialization.
//!
//! Binaries call [`init_tracing`] once at startup and keep the returned [`LogFlusher`]
//! alive until exit so buffered log lines are written out. Tests call
//! [`init_test_tracing`], which is safe to call from every test.

use std::str::FromStr;
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines, meant for terminals.
    #[default]
    Pretty,
    /// One JSON object per line, meant for log collectors.
    Json,
}

impl FromStr for LogFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TracingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// The requested log format is not supported.
    #[error("unknown log format `{0}`, use `pretty` or `json`")]
    UnknownFormat(String),
    /// Bridging `log` records into tracing failed.
    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
    /// A global subscriber was already installed.
    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Flushes buffered log lines when dropped.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global tracing subscriber for a binary.
///
/// Log lines go to stdout through a non-blocking writer. The filter comes from
/// `RUST_LOG` and defaults to `info`. Records emitted through the `log` crate by
/// dependencies are forwarded to tracing.
pub fn init_tracing(app_name: &str, format: LogFormat) -> Result<LogFlusher, TracingError> {
    tracing_log::LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(writer).with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true),
            )
            .try_init()?,
    }

    ::tracing::info!(app = app_name, ?format, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing through the test harness, once per test binary.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
