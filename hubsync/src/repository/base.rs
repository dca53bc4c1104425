use bytes::Bytes;
use std::future::Future;

use crate::error::SyncResult;

/// Metadata attached to a commit on the remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit summary line.
    pub message: String,
    /// Commit the change only if the revision still points at this commit.
    pub parent_commit: Option<String>,
}

impl CommitOptions {
    /// Creates options for an unconditional commit.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            parent_commit: None,
        }
    }

    /// Makes the commit conditional on the revision still pointing at `parent_commit`.
    pub fn with_parent_commit(mut self, parent_commit: Option<String>) -> Self {
        self.parent_commit = parent_commit;
        self
    }
}

/// Trait for dataset repositories holding observation files and the snapshot.
///
/// A [`Repository`] is bound to a single repository id and revision. Every call is a
/// remote round trip and is awaited to completion before the flow moves on.
///
/// Implementations must report a missing file on [`Repository::download`] with
/// [`crate::error::ErrorKind::NotFound`] so that callers can tell a missing snapshot apart
/// from a failed request.
pub trait Repository {
    /// Returns the identifier of the repository.
    fn repo_id(&self) -> &str;

    /// Lists the paths of every file in the repository.
    fn list_files(&self) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Downloads the content of the file at `path`.
    fn download(&self, path: &str) -> impl Future<Output = SyncResult<Bytes>> + Send;

    /// Returns whether a file exists at `path`.
    fn file_exists(&self, path: &str) -> impl Future<Output = SyncResult<bool>> + Send;

    /// Returns the commit the revision currently points at, if the backend exposes one.
    fn head_commit(&self) -> impl Future<Output = SyncResult<Option<String>>> + Send;

    /// Deletes the file at `path` in a single commit.
    fn delete_file(
        &self,
        path: &str,
        commit: &CommitOptions,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Creates or replaces the file at `path` in a single commit.
    fn upload_file(
        &self,
        path: &str,
        content: Bytes,
        commit: &CommitOptions,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}
