use hubsync_config::shared::{DatasetConfig, RebuildConfig, SyncConfig};
use tracing::info;

use crate::error::SyncResult;
use crate::flows::parent_commit;
use crate::lister::{ObservationFilter, list_filtered_observation_files};
use crate::merger::{MergeSummary, Merger};
use crate::publisher::{Publisher, SnapshotDeletion};
use crate::repository::{CommitOptions, Repository};
use crate::table::Table;

/// Result of a rebuild run.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    /// The table rebuilt from the observation files.
    pub table: Table,
    /// Counts of the merge that filled `table`.
    pub summary: MergeSummary,
    /// What happened to the previous snapshot.
    pub deletion: SnapshotDeletion,
    /// Whether the rebuilt table was pushed as the new snapshot.
    pub published: bool,
}

/// Deletes the snapshot and regenerates it from every observation file.
///
/// With `dry_run` the repository is left untouched and the rebuilt table is only returned.
/// When no observation is merged the old snapshot stays deleted and nothing replaces it.
pub async fn rebuild_dataset<R>(
    repository: &R,
    dataset: &DatasetConfig,
    config: &SyncConfig,
    rebuild: &RebuildConfig,
    dry_run: bool,
) -> SyncResult<RebuildReport>
where
    R: Repository,
{
    let publisher = Publisher::new(repository, &dataset.snapshot_path);

    let deletion = if dry_run {
        SnapshotDeletion::Skipped
    } else {
        let parent = parent_commit(repository, config.guard_concurrent_writes).await?;
        let commit = CommitOptions::new(format!("Delete {} snapshot before rebuild", dataset.split))
            .with_parent_commit(parent);
        publisher.delete_snapshot_if_exists(&commit).await
    };

    // Our own deletion moved the revision, so the push is pinned to the state listed below.
    let parent = parent_commit(repository, config.guard_concurrent_writes && !dry_run).await?;

    let filter = ObservationFilter::new(rebuild.exclude_patterns.iter().cloned());
    let files = list_filtered_observation_files(repository, &filter).await?;

    let mut table = Table::empty(dataset.split.as_str());
    let summary = Merger::new(repository, &dataset.key_column)
        .with_policy(config.malformed_records)
        .merge(&files, &mut table)
        .await?;

    let published = if dry_run {
        info!(
            repo_id = repository.repo_id(),
            rows = table.len(),
            "dry run, not publishing the rebuilt snapshot"
        );
        false
    } else if summary.has_inserts() {
        let commit = CommitOptions::new(format!(
            "Rebuild {} from {} observation(s)",
            dataset.split, summary.inserted
        ))
        .with_parent_commit(parent);
        publisher.push(&table, &commit).await?;
        true
    } else {
        info!(
            repo_id = repository.repo_id(),
            "no observations to rebuild from, snapshot left deleted"
        );
        false
    };

    Ok(RebuildReport {
        table,
        summary,
        deletion,
        published,
    })
}
