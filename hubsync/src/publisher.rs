//! Writes and removes the snapshot file in the dataset repository.

use tracing::{error, info, warn};

use crate::error::SyncResult;
use crate::failpoints::{PUBLISH_BEFORE_UPLOAD_FP, sync_fail_point};
use crate::repository::{CommitOptions, Repository};
use crate::snapshot::encode_parquet;
use crate::table::Table;

/// Outcome of removing the snapshot before a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDeletion {
    /// The snapshot existed and was deleted.
    Deleted,
    /// There was no snapshot to delete.
    Missing,
    /// The snapshot could not be checked or deleted. The rebuild carries on regardless.
    Failed,
    /// Deletion was not attempted.
    Skipped,
}

/// Writes and removes the snapshot file of a repository.
#[derive(Debug)]
pub struct Publisher<'a, R> {
    repository: &'a R,
    snapshot_path: &'a str,
}

impl<'a, R> Publisher<'a, R>
where
    R: Repository,
{
    pub fn new(repository: &'a R, snapshot_path: &'a str) -> Self {
        Self {
            repository,
            snapshot_path,
        }
    }

    /// Encodes `table` and uploads it over the current snapshot.
    ///
    /// Failures are logged here and returned to the caller.
    pub async fn push(&self, table: &Table, commit: &CommitOptions) -> SyncResult<()> {
        let result = self.try_push(table, commit).await;

        match &result {
            Ok(()) => info!(
                repo_id = self.repository.repo_id(),
                path = self.snapshot_path,
                rows = table.len(),
                "published snapshot"
            ),
            Err(err) => error!(
                repo_id = self.repository.repo_id(),
                path = self.snapshot_path,
                error = %err,
                "failed to publish snapshot"
            ),
        }

        result
    }

    async fn try_push(&self, table: &Table, commit: &CommitOptions) -> SyncResult<()> {
        let content = encode_parquet(table)?;
        sync_fail_point(PUBLISH_BEFORE_UPLOAD_FP)?;

        self.repository
            .upload_file(self.snapshot_path, content, commit)
            .await
    }

    /// Deletes the snapshot when it exists.
    ///
    /// Never fails: problems are logged and reported as [`SnapshotDeletion::Failed`].
    pub async fn delete_snapshot_if_exists(&self, commit: &CommitOptions) -> SnapshotDeletion {
        let repo_id = self.repository.repo_id();
        let path = self.snapshot_path;

        match self.repository.file_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                info!(repo_id, path, "no snapshot to delete");
                return SnapshotDeletion::Missing;
            }
            Err(err) => {
                warn!(repo_id, path, error = %err, "could not check for the snapshot");
                return SnapshotDeletion::Failed;
            }
        }

        match self.repository.delete_file(path, commit).await {
            Ok(()) => {
                info!(repo_id, path, "deleted snapshot");
                SnapshotDeletion::Deleted
            }
            Err(err) => {
                warn!(repo_id, path, error = %err, "could not delete the snapshot");
                SnapshotDeletion::Failed
            }
        }
    }
}
