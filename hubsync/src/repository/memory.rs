//! In-memory [`Repository`](crate::repository::Repository) that records every commit.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::repository::{CommitOptions, Repository};

/// Change recorded by a commit on a [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOperation {
    /// A file was created or replaced.
    Upload { path: String, size: usize },
    /// A file was deleted.
    Delete { path: String },
}

/// A commit recorded by a [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit id, the zero-padded hex position of the commit in history.
    pub id: String,
    /// Commit summary line.
    pub message: String,
    /// The change this commit applied.
    pub operation: CommitOperation,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Bytes>,
    commits: Vec<CommitRecord>,
}

impl Inner {
    fn head(&self) -> String {
        commit_id(self.commits.len())
    }

    fn check_parent(&self, commit: &CommitOptions) -> SyncResult<()> {
        if let Some(parent) = &commit.parent_commit
            && *parent != self.head()
        {
            bail!(
                ErrorKind::CommitConflict,
                "Repository revision moved since the run started",
                format!("expected parent {parent}, head is {}", self.head())
            );
        }

        Ok(())
    }

    fn record(&mut self, message: &str, operation: CommitOperation) {
        let id = commit_id(self.commits.len() + 1);
        self.commits.push(CommitRecord {
            id,
            message: message.to_string(),
            operation,
        });
    }
}

fn commit_id(position: usize) -> String {
    format!("{position:040x}")
}

/// In-memory dataset repository for tests and local development.
///
/// [`MemoryRepository`] keeps files in a sorted map, so listings come back in path order,
/// and records every commit so that callers can check whether a run pushed anything.
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    repo_id: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Adds or replaces a file as an external uploader would, recording a commit.
    pub async fn put_file(&self, path: impl Into<String>, content: impl Into<Bytes>) {
        let path = path.into();
        let content = content.into();
        let mut inner = self.inner.lock().await;

        let operation = CommitOperation::Upload {
            path: path.clone(),
            size: content.len(),
        };
        inner.record(&format!("Upload {path}"), operation);
        inner.files.insert(path, content);
    }

    /// Returns the content of the file at `path`, if any.
    pub async fn file(&self, path: &str) -> Option<Bytes> {
        let inner = self.inner.lock().await;
        inner.files.get(path).cloned()
    }

    /// Returns every file path in sorted order.
    pub async fn paths(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.files.keys().cloned().collect()
    }

    /// Returns the commit history, oldest first.
    pub async fn commits(&self) -> Vec<CommitRecord> {
        let inner = self.inner.lock().await;
        inner.commits.clone()
    }
}

impl Repository for MemoryRepository {
    fn repo_id(&self) -> &str {
        &self.repo_id
    }

    async fn list_files(&self) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.files.keys().cloned().collect())
    }

    async fn download(&self, path: &str) -> SyncResult<Bytes> {
        let inner = self.inner.lock().await;

        match inner.files.get(path) {
            Some(content) => Ok(content.clone()),
            None => bail!(
                ErrorKind::NotFound,
                "File does not exist in the repository",
                format!("{}: {path}", self.repo_id)
            ),
        }
    }

    async fn file_exists(&self, path: &str) -> SyncResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.files.contains_key(path))
    }

    async fn head_commit(&self) -> SyncResult<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(Some(inner.head()))
    }

    async fn delete_file(&self, path: &str, commit: &CommitOptions) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_parent(commit)?;

        if inner.files.remove(path).is_none() {
            bail!(
                ErrorKind::NotFound,
                "File does not exist in the repository",
                format!("{}: {path}", self.repo_id)
            );
        }

        info!(repo_id = %self.repo_id, path, "deleted file");
        inner.record(
            &commit.message,
            CommitOperation::Delete {
                path: path.to_string(),
            },
        );

        Ok(())
    }

    async fn upload_file(
        &self,
        path: &str,
        content: Bytes,
        commit: &CommitOptions,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_parent(commit)?;

        info!(repo_id = %self.repo_id, path, size = content.len(), "uploaded file");
        inner.record(
            &commit.message,
            CommitOperation::Upload {
                path: path.to_string(),
                size: content.len(),
            },
        );
        inner.files.insert(path.to_string(), content);

        Ok(())
    }
}
