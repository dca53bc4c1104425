use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    DatasetConfig, HubConfig, HubConfigWithoutSecrets, RebuildConfig, SentryConfig, SyncConfig,
    ValidationError,
};

/// Complete configuration of a hubsync run.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Hub connection settings.
    #[serde(default)]
    pub hub: HubConfig,
    /// Dataset repository and snapshot location.
    pub dataset: DatasetConfig,
    /// Sync and merge policy.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Rebuild settings.
    #[serde(default)]
    pub rebuild: RebuildConfig,
    /// Optional Sentry configuration for error reporting.
    #[serde(default)]
    pub sentry: Option<SentryConfig>,
}

impl AppConfig {
    /// Validates the complete configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.hub.validate()?;
        self.dataset.validate()
    }
}

impl Config for AppConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["rebuild.exclude_patterns"];
}

/// Same as [`AppConfig`] but without secrets, safe to serialize and log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfigWithoutSecrets {
    pub hub: HubConfigWithoutSecrets,
    pub dataset: DatasetConfig,
    pub sync: SyncConfig,
    pub rebuild: RebuildConfig,
}

impl From<AppConfig> for AppConfigWithoutSecrets {
    fn from(value: AppConfig) -> Self {
        AppConfigWithoutSecrets {
            hub: value.hub.into(),
            dataset: value.dataset,
            sync: value.sync,
            rebuild: value.rebuild,
        }
    }
}
