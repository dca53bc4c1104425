use hubsync_config::shared::{DatasetConfig, SyncConfig};
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::flows::parent_commit;
use crate::lister::list_observation_files;
use crate::merger::{MergeSummary, Merger};
use crate::publisher::Publisher;
use crate::repository::{CommitOptions, Repository};
use crate::snapshot::load_snapshot;
use crate::table::Table;

/// How a sync run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The repository holds no observation files. The snapshot was not touched.
    NoObservations,
    /// Every observation is already in the snapshot. Nothing was pushed.
    UpToDate { summary: MergeSummary },
    /// New observations were appended and the snapshot was pushed.
    Published { summary: MergeSummary },
    /// No snapshot exists and creating one was not allowed.
    SnapshotMissing,
}

impl SyncOutcome {
    /// Returns the number of observations added by the run.
    ///
    /// [`None`] means the count is unknown because there was no snapshot to sync into,
    /// which is different from zero new observations.
    pub fn new_records(&self) -> Option<usize> {
        match self {
            SyncOutcome::NoObservations => Some(0),
            SyncOutcome::UpToDate { summary } | SyncOutcome::Published { summary } => {
                Some(summary.inserted)
            }
            SyncOutcome::SnapshotMissing => None,
        }
    }
}

/// Appends the observations not yet in the snapshot and pushes the result.
pub async fn sync_dataset<R>(
    repository: &R,
    dataset: &DatasetConfig,
    config: &SyncConfig,
) -> SyncResult<SyncOutcome>
where
    R: Repository,
{
    let parent = parent_commit(repository, config.guard_concurrent_writes).await?;

    let files = list_observation_files(repository).await?;
    if files.is_empty() {
        info!(repo_id = repository.repo_id(), "no observation files, nothing to sync");
        return Ok(SyncOutcome::NoObservations);
    }

    let snapshot = load_snapshot(repository, &dataset.snapshot_path, &dataset.split).await?;
    let mut table = match snapshot {
        Some(table) => table,
        None if config.create_if_missing => {
            info!(
                repo_id = repository.repo_id(),
                path = %dataset.snapshot_path,
                "creating a new snapshot"
            );
            Table::empty(dataset.split.as_str())
        }
        None => {
            warn!(
                repo_id = repository.repo_id(),
                path = %dataset.snapshot_path,
                "snapshot does not exist and creating it is disabled"
            );
            return Ok(SyncOutcome::SnapshotMissing);
        }
    };

    let summary = Merger::new(repository, &dataset.key_column)
        .with_policy(config.malformed_records)
        .merge(&files, &mut table)
        .await?;

    if !summary.has_inserts() {
        info!(repo_id = repository.repo_id(), "snapshot is up to date");
        return Ok(SyncOutcome::UpToDate { summary });
    }

    let commit = CommitOptions::new(format!(
        "Add {} observation(s) to {}",
        summary.inserted, dataset.split
    ))
    .with_parent_commit(parent);
    Publisher::new(repository, &dataset.snapshot_path)
        .push(&table, &commit)
        .await?;

    Ok(SyncOutcome::Published { summary })
}
