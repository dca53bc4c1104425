//! Deduplicating merge of observation files into a [`Table`].

use std::collections::HashSet;

use hubsync_config::shared::MalformedRecordPolicy;
use tracing::{info, warn};

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::failpoints::{MERGE_AFTER_DOWNLOAD_FP, sync_fail_point};
use crate::record::Observation;
use crate::repository::Repository;
use crate::snapshot::misfit_column;
use crate::sync_error;
use crate::table::Table;

/// Result of merging a list of observation files into a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of rows appended to the table.
    pub inserted: usize,
    /// Keys skipped because a row with the same key was already present.
    pub duplicates: Vec<String>,
    /// Paths skipped as malformed under [`MalformedRecordPolicy::Skip`].
    pub rejected: Vec<String>,
}

impl MergeSummary {
    /// Returns `true` when the merge appended at least one row.
    pub fn has_inserts(&self) -> bool {
        self.inserted > 0
    }
}

/// Appends observations to a table, keeping at most one row per key.
///
/// Files are processed in the given order, so when several files share a key the first one
/// wins, whether the key was already in the table or appeared earlier in the same run.
#[derive(Debug)]
pub struct Merger<'a, R> {
    repository: &'a R,
    key_column: &'a str,
    policy: MalformedRecordPolicy,
}

impl<'a, R> Merger<'a, R>
where
    R: Repository,
{
    /// Creates a merger that aborts on the first malformed record.
    pub fn new(repository: &'a R, key_column: &'a str) -> Self {
        Self {
            repository,
            key_column,
            policy: MalformedRecordPolicy::default(),
        }
    }

    /// Sets how malformed records are handled.
    pub fn with_policy(mut self, policy: MalformedRecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Downloads each of `files` and appends the ones whose key is not yet in `table`.
    ///
    /// Download failures always abort the merge. Rows appended before a failure stay in
    /// `table`; callers discard it on error.
    pub async fn merge(&self, files: &[String], table: &mut Table) -> SyncResult<MergeSummary> {
        let mut summary = MergeSummary::default();
        let mut known_keys: HashSet<String> = table.key_set(self.key_column);

        for path in files {
            let content = self.repository.download(path).await?;
            sync_fail_point(MERGE_AFTER_DOWNLOAD_FP)?;

            let observation = match Observation::parse(path, &content, self.key_column) {
                Ok(observation) => observation,
                Err(err) => {
                    self.reject(err, path, &mut summary)?;
                    continue;
                }
            };

            // A table without the key column has an empty key set, so its first observation is
            // always inserted.
            if known_keys.contains(observation.key()) {
                info!(
                    key = observation.key(),
                    path = %path,
                    "observation already in the table, skipping"
                );
                summary.duplicates.push(observation.key().to_owned());
                continue;
            }

            if let Some(column) = misfit_column(table, observation.fields()) {
                let err = sync_error!(
                    ErrorKind::InvalidData,
                    "Observation field does not fit the committed snapshot column",
                    format!("{path}: field `{column}`")
                );
                self.reject(err, path, &mut summary)?;
                continue;
            }

            known_keys.insert(observation.key().to_owned());
            table.append_row(observation.into_row());
            summary.inserted += 1;
        }

        info!(
            repo_id = self.repository.repo_id(),
            files = files.len(),
            inserted = summary.inserted,
            duplicates = summary.duplicates.len(),
            rejected = summary.rejected.len(),
            rows = table.len(),
            "merged observations"
        );

        Ok(summary)
    }

    /// Records `path` as rejected when `err` marks a malformed record that the policy skips,
    /// and returns `err` otherwise.
    fn reject(&self, err: SyncError, path: &str, summary: &mut MergeSummary) -> SyncResult<()> {
        if is_malformed(err.kind()) && self.policy == MalformedRecordPolicy::Skip {
            warn!(path = %path, error = %err, "skipping malformed observation");
            summary.rejected.push(path.to_owned());
            return Ok(());
        }

        Err(err)
    }
}

fn is_malformed(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::DeserializationError | ErrorKind::InvalidData
    )
}
