use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Identifies the dataset repository and the snapshot inside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatasetConfig {
    /// Repository id in `namespace/name` form.
    pub repo_id: String,
    /// Path of the Parquet snapshot within the repository.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// Name of the table (split) the snapshot holds.
    #[serde(default = "default_split")]
    pub split: String,
    /// Field used to deduplicate observations.
    #[serde(default = "default_key_column")]
    pub key_column: String,
}

impl DatasetConfig {
    /// Default snapshot path, a single shard of the `train` split.
    pub const DEFAULT_SNAPSHOT_PATH: &'static str = "data/train-00000-of-00001.parquet";

    /// Default split name.
    pub const DEFAULT_SPLIT: &'static str = "train";

    /// Default deduplication field.
    pub const DEFAULT_KEY_COLUMN: &'static str = "image_md5";

    /// Creates a dataset configuration for `repo_id` with default paths.
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            snapshot_path: default_snapshot_path(),
            split: default_split(),
            key_column: default_key_column(),
        }
    }

    /// Validates the dataset settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut parts = self.repo_id.split('/');
        let valid_repo_id = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty()
        );
        if !valid_repo_id {
            return Err(ValidationError::InvalidRepoId(self.repo_id.clone()));
        }

        if self.snapshot_path.starts_with('/') || !self.snapshot_path.ends_with(".parquet") {
            return Err(ValidationError::InvalidSnapshotPath(
                self.snapshot_path.clone(),
            ));
        }

        if self.split.is_empty() {
            return Err(ValidationError::EmptyField("dataset.split"));
        }

        if self.key_column.is_empty() {
            return Err(ValidationError::EmptyField("dataset.key_column"));
        }

        Ok(())
    }
}

fn default_snapshot_path() -> String {
    DatasetConfig::DEFAULT_SNAPSHOT_PATH.to_string()
}

fn default_split() -> String {
    DatasetConfig::DEFAULT_SPLIT.to_string()
}

fn default_key_column() -> String {
    DatasetConfig::DEFAULT_KEY_COLUMN.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_needs_namespace_and_name() {
        assert!(DatasetConfig::new("org/observations").validate().is_ok());

        for repo_id in ["observations", "org/", "/name", "a/b/c"] {
            assert!(matches!(
                DatasetConfig::new(repo_id).validate(),
                Err(ValidationError::InvalidRepoId(_))
            ));
        }
    }

    #[test]
    fn snapshot_path_must_be_relative_parquet() {
        let mut config = DatasetConfig::new("org/observations");
        config.snapshot_path = "/data/train.parquet".to_string();
        assert!(config.validate().is_err());

        config.snapshot_path = "data/train.csv".to_string();
        assert!(config.validate().is_err());
    }
}
