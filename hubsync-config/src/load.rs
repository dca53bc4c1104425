use std::{
    io,
    path::{Path, PathBuf},
};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use rust_cli_config::{Map, Value};

/// Directory searched for the configuration file when none is given explicitly.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the configuration file.
const CONFIG_FILE_STEM: &str = "hubsync";

/// Supported extensions for the configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "HUBSYNC";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// An explicitly requested configuration directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// The configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// An explicit override could not be applied.
    #[error("failed to apply override for `{key}`: {source}")]
    Override {
        key: String,
        source: rust_cli_config::ConfigError,
    },

    /// The sources were merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// Failed to build the merged configuration.
    #[error("failed to build configuration: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Loads configuration from the configuration file, the environment and explicit overrides.
///
/// Sources, lowest precedence first:
/// 1. `hubsync.(yaml|yml|json)` in `directory`, or in `./configuration` when `directory` is
///    [`None`]. The file is optional unless `directory` was given and does not exist.
/// 2. `HUBSYNC_`-prefixed environment variables. Nested keys use double underscores
///    (`HUBSYNC_DATASET__REPO_ID`) and list values are comma-separated.
/// 3. `overrides`, typically command line flags.
pub fn load_config<T>(directory: Option<&Path>, overrides: &[(&str, Value)]) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    load_config_from(directory, overrides, None)
}

/// Same as [`load_config`], reading environment overrides from `environment` instead of the
/// process environment when it is provided.
pub fn load_config_from<T>(
    directory: Option<&Path>,
    overrides: &[(&str, Value)],
    environment: Option<Map<String, String>>,
) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let configuration_directory = match directory {
        Some(directory) => {
            if !directory.is_dir() {
                return Err(LoadConfigError::MissingConfigurationDirectory(
                    directory.to_path_buf(),
                ));
            }

            directory.to_path_buf()
        }
        None => std::env::current_dir()
            .map_err(LoadConfigError::CurrentDir)?
            .join(CONFIGURATION_DIR),
    };

    let mut builder = rust_cli_config::Config::builder();

    if let Some(config_file) = find_configuration_file(&configuration_directory) {
        builder = builder.add_source(rust_cli_config::File::from(config_file.clone()));
        validate_configuration_source(&builder, &config_file)?;
    }

    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .source(environment);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    builder = builder.add_source(environment_source);

    for (key, value) in overrides {
        builder = builder
            .set_override(*key, value.clone())
            .map_err(|source| LoadConfigError::Override {
                key: key.to_string(),
                source,
            })?;
    }

    let settings = builder.build().map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Returns the first configuration file with a supported extension, if any.
fn find_configuration_file(directory: &Path) -> Option<PathBuf> {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{CONFIG_FILE_STEM}.{extension}")))
        .find(|path| path.is_file())
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use secrecy::ExposeSecret;

    use super::*;
    use crate::shared::{AppConfig, DatasetConfig, MalformedRecordPolicy};

    fn write_config(directory: &Path, contents: &str) {
        fs::write(directory.join("hubsync.yaml"), contents).unwrap();
    }

    #[test]
    fn file_values_are_merged_with_defaults() {
        let directory = tempfile::tempdir().unwrap();
        write_config(
            directory.path(),
            "dataset:\n  repo_id: org/observations\nsync:\n  malformed_records: skip\n",
        );

        let config: AppConfig =
            load_config_from(Some(directory.path()), &[], Some(Map::new())).unwrap();

        assert_eq!(config.dataset.repo_id, "org/observations");
        assert_eq!(
            config.dataset.snapshot_path,
            DatasetConfig::DEFAULT_SNAPSHOT_PATH
        );
        assert_eq!(config.sync.malformed_records, MalformedRecordPolicy::Skip);
        assert!(!config.sync.create_if_missing);
        assert!(config.hub.token.is_none());
    }

    #[test]
    fn environment_overrides_file_and_parses_lists() {
        let directory = tempfile::tempdir().unwrap();
        write_config(directory.path(), "dataset:\n  repo_id: org/observations\n");

        let mut environment = Map::new();
        environment.insert(
            "HUBSYNC_DATASET__REPO_ID".to_string(),
            "org/other".to_string(),
        );
        environment.insert("HUBSYNC_HUB__TOKEN".to_string(), "secret".to_string());
        environment.insert(
            "HUBSYNC_REBUILD__EXCLUDE_PATTERNS".to_string(),
            "test_data@whale.org,sandbox".to_string(),
        );

        let config: AppConfig =
            load_config_from(Some(directory.path()), &[], Some(environment)).unwrap();

        assert_eq!(config.dataset.repo_id, "org/other");
        assert_eq!(config.hub.token.unwrap().expose_secret(), "secret");
        assert_eq!(
            config.rebuild.exclude_patterns,
            vec!["test_data@whale.org".to_string(), "sandbox".to_string()]
        );
    }

    #[test]
    fn explicit_overrides_win() {
        let directory = tempfile::tempdir().unwrap();
        write_config(directory.path(), "dataset:\n  repo_id: org/observations\n");

        let overrides = [
            ("dataset.repo_id", Value::from("org/cli".to_string())),
            ("sync.create_if_missing", Value::from(true)),
        ];
        let config: AppConfig =
            load_config_from(Some(directory.path()), &overrides, Some(Map::new())).unwrap();

        assert_eq!(config.dataset.repo_id, "org/cli");
        assert!(config.sync.create_if_missing);
    }

    #[test]
    fn missing_explicit_directory_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        let missing = directory.path().join("nope");

        let result: Result<AppConfig, _> = load_config_from(Some(&missing), &[], Some(Map::new()));

        assert!(matches!(
            result,
            Err(LoadConfigError::MissingConfigurationDirectory(_))
        ));
    }

    #[test]
    fn repo_id_is_required() {
        let directory = tempfile::tempdir().unwrap();

        let result: Result<AppConfig, _> =
            load_config_from(Some(directory.path()), &[], Some(Map::new()));

        assert!(matches!(result, Err(LoadConfigError::Deserialization(_))));
    }
}
