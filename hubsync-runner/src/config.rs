use hubsync_config::load_config;
use hubsync_config::shared::AppConfig;

use crate::cli::Cli;
use crate::error::{RunnerError, RunnerResult};

/// Loads and validates the configuration, applying command line flags last.
pub fn load_app_config(cli: &Cli) -> RunnerResult<AppConfig> {
    let overrides = cli.overrides();
    let config = load_config::<AppConfig>(cli.config_dir.as_deref(), &overrides)
        .map_err(RunnerError::config)?;
    config.validate().map_err(RunnerError::config)?;

    Ok(config)
}
