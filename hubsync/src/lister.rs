//! Discovery of the observation files held by a dataset repository.

use tracing::info;

use crate::error::SyncResult;
use crate::record::OBSERVATION_FILE_EXTENSION;
use crate::repository::Repository;

/// Exclusion rules applied to listed observation paths.
///
/// A path is excluded when any of its `/`-separated segments contains one of the
/// patterns. An empty filter keeps every path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFilter {
    exclude_patterns: Vec<String>,
}

impl ObservationFilter {
    /// Creates a filter excluding paths matching any of `patterns`.
    ///
    /// Empty patterns are ignored since they would match every path.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude_patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|pattern| !pattern.is_empty())
                .collect(),
        }
    }

    /// Returns `true` when `path` should be kept.
    pub fn keeps(&self, path: &str) -> bool {
        !path.split('/').any(|segment| {
            self.exclude_patterns
                .iter()
                .any(|pattern| segment.contains(pattern.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.exclude_patterns.is_empty()
    }
}

/// Lists the observation files of `repository` in listing order.
pub async fn list_observation_files<R>(repository: &R) -> SyncResult<Vec<String>>
where
    R: Repository,
{
    list_filtered_observation_files(repository, &ObservationFilter::default()).await
}

/// Lists the observation files of `repository` that `filter` keeps.
pub async fn list_filtered_observation_files<R>(
    repository: &R,
    filter: &ObservationFilter,
) -> SyncResult<Vec<String>>
where
    R: Repository,
{
    let files = repository.list_files().await?;
    let total = files.len();

    let mut excluded = 0;
    let observations: Vec<String> = files
        .into_iter()
        .filter(|path| path.ends_with(OBSERVATION_FILE_EXTENSION))
        .filter(|path| {
            let keep = filter.keeps(path);
            if !keep {
                excluded += 1;
            }
            keep
        })
        .collect();

    info!(
        repo_id = repository.repo_id(),
        files = total,
        observations = observations.len(),
        excluded,
        "listed observation files"
    );

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryRepository;

    #[test]
    fn filter_matches_any_path_segment() {
        let filter = ObservationFilter::new(["test_", "scratch"]);

        assert!(filter.keeps("data/2024/obs-1.json"));
        assert!(!filter.keeps("data/test_run/obs-1.json"));
        assert!(!filter.keeps("my_scratch/obs-1.json"));
        assert!(!filter.keeps("data/test_obs.json"));
    }

    #[test]
    fn empty_patterns_are_ignored() {
        let filter = ObservationFilter::new([""]);

        assert!(filter.is_empty());
        assert!(filter.keeps("data/obs.json"));
    }

    #[tokio::test]
    async fn only_json_files_are_listed() {
        let repository = MemoryRepository::new("org/observations");
        repository.put_file("README.md", "# readme").await;
        repository.put_file("data/a.json", "{}").await;
        repository
            .put_file("data/train-00000-of-00001.parquet", "PAR1")
            .await;
        repository.put_file("data/b.json", "{}").await;

        let files = list_observation_files(&repository).await.unwrap();

        assert_eq!(files, ["data/a.json", "data/b.json"]);
    }

    #[tokio::test]
    async fn empty_repository_lists_nothing() {
        let repository = MemoryRepository::new("org/observations");

        let files = list_observation_files(&repository).await.unwrap();

        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn filter_drops_excluded_paths() {
        let repository = MemoryRepository::new("org/observations");
        repository.put_file("data/a.json", "{}").await;
        repository.put_file("tmp_uploads/b.json", "{}").await;

        let filter = ObservationFilter::new(["tmp_"]);
        let files = list_filtered_observation_files(&repository, &filter)
            .await
            .unwrap();

        assert_eq!(files, ["data/a.json"]);
    }
}
