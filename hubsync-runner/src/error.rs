use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use hubsync::error::SyncError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the `hubsync` binary.
///
/// Wraps [`SyncError`] for failed runs and provides variants for setup errors.
#[derive(Debug)]
pub enum RunnerError {
    /// The sync or rebuild failed.
    Sync(SyncError),
    /// Configuration, logging or error reporting could not be set up.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error, e.g. while building the runtime.
    Io(std::io::Error, CapturedBacktrace),
}

impl RunnerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Sync(_) => "sync error",
            RunnerError::Config(_, _) => "configuration error",
            RunnerError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            RunnerError::Sync(err) => err.backtrace(),
            RunnerError::Config(_, cb) => &cb.0,
            RunnerError::Io(_, cb) => &cb.0,
        }
    }

    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns the wrapped [`SyncError`], if any.
    pub fn as_sync_error(&self) -> Option<&SyncError> {
        match self {
            RunnerError::Sync(err) => Some(err),
            _ => None,
        }
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("hubsync failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        if let RunnerError::Sync(err) = self {
            out.push_str(&format!("kind: {:?}\n", err.kind()));
            out.push_str(&format!("location: {}\n", err.location()));
        }

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace() {
            out.push_str("backtrace:\n");
            out.push_str(&self.backtrace().to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Sync(err) => write!(f, "{err}"),
            RunnerError::Config(source, _) => write!(f, "configuration error: {source}"),
            RunnerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for RunnerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunnerError::Sync(err) => err.source(),
            RunnerError::Config(source, _) => Some(source.as_ref()),
            RunnerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SyncError> for RunnerError {
    fn from(err: SyncError) -> Self {
        RunnerError::Sync(err)
    }
}

#[cfg(test)]
mod tests {
    use hubsync::error::ErrorKind;

    use super::*;

    #[test]
    fn report_names_kind_and_causes() {
        let io = std::io::Error::other("connection reset");
        let err = RunnerError::from(
            SyncError::from((ErrorKind::RemoteError, "Hub request failed")).with_source(io),
        );

        let report = err.render_report();

        assert!(report.starts_with("hubsync failed\n"));
        assert!(report.contains("category: sync error"));
        assert!(report.contains("kind: RemoteError"));
        assert!(report.contains("cause 1: connection reset"));
    }

    #[test]
    fn config_errors_keep_their_source() {
        let err = RunnerError::config(std::io::Error::other("bad yaml"));

        assert_eq!(err.category(), "configuration error");
        assert_eq!(err.to_string(), "configuration error: bad yaml");
        assert!(err.as_sync_error().is_none());
    }
}
