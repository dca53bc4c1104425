//! Error types and result definitions for hubsync operations.
//!
//! [`SyncError`] carries an [`ErrorKind`] used by the flows to tell recoverable outcomes
//! (a missing snapshot, a missing file) apart from failures, a static description, an optional
//! dynamic detail, the originating error and the callsite where it was raised.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for hubsync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Specific categories of errors that can occur while syncing a dataset.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Remote errors
    RemoteConnectionFailed,
    RemoteError,
    NotFound,
    CommitConflict,
    UnsupportedUpload,

    // Security & authentication errors
    AuthenticationError,
    PermissionDenied,

    // Data errors
    DeserializationError,
    SerializationError,
    InvalidData,
    SnapshotFormatError,

    // Configuration & state errors
    ConfigError,
    InvalidState,

    // IO errors
    IoError,

    // Unknown / uncategorized
    Unknown,
}

/// Main error type for hubsync operations.
#[derive(Debug, Clone)]
pub struct SyncError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns `true` when the error reports a missing remote file or repository.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail.as_deref() {
            if detail.trim().is_empty() {
                write!(f, "\n  Detail: <empty>")?;
            } else {
                write!(f, "\n  Detail:")?;
                for line in detail.lines() {
                    write!(f, "\n    {line}")?;
                }
            }
        }

        Ok(())
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps JSON syntax and data errors to [`ErrorKind::DeserializationError`].
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps transport failures to [`ErrorKind::RemoteConnectionFailed`] and the rest to
/// [`ErrorKind::RemoteError`].
impl From<reqwest::Error> for SyncError {
    #[track_caller]
    fn from(err: reqwest::Error) -> SyncError {
        let (kind, description) = if err.is_connect() || err.is_timeout() {
            (
                ErrorKind::RemoteConnectionFailed,
                "Could not reach the hub",
            )
        } else if err.is_decode() {
            (
                ErrorKind::DeserializationError,
                "Hub response could not be decoded",
            )
        } else {
            (ErrorKind::RemoteError, "Hub request failed")
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<arrow::error::ArrowError> for SyncError {
    #[track_caller]
    fn from(err: arrow::error::ArrowError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::SnapshotFormatError,
            Cow::Borrowed("Arrow operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<parquet::errors::ParquetError> for SyncError {
    #[track_caller]
    fn from(err: parquet::errors::ParquetError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::SnapshotFormatError,
            Cow::Borrowed("Parquet operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, sync_error};

    fn failing() -> SyncResult<()> {
        bail!(ErrorKind::InvalidData, "Observation is not an object", "a.json");
    }

    #[test]
    fn bail_records_kind_detail_and_location() {
        let err = failing().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.detail(), Some("a.json"));
        assert!(err.location().file().ends_with("error.rs"));
        assert!(err.to_string().contains("Observation is not an object"));
    }

    #[test]
    fn source_is_exposed_through_error_trait() {
        let io = std::io::Error::other("disk");
        let err = sync_error!(ErrorKind::IoError, "Write failed", source: io);

        let source = error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk");
    }

    #[test]
    fn json_syntax_errors_are_deserialization_errors() {
        let err: SyncError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }
}
