use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hubsync_config::Value;
use hubsync_telemetry::tracing::LogFormat;

/// Keeps the Parquet snapshot of a hub dataset in sync with its observation files.
#[derive(Parser, Debug)]
#[command(name = "hubsync", version)]
pub struct Cli {
    /// Directory holding `hubsync.yaml`, `hubsync.yml` or `hubsync.json`
    #[arg(long, env = "HUBSYNC_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Dataset repository id, e.g. `org/name`
    #[arg(long)]
    pub repo_id: Option<String>,

    /// Path of the Parquet snapshot inside the repository
    #[arg(long)]
    pub snapshot_path: Option<String>,

    /// Log output format: `pretty` or `json`
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append new observations to the existing snapshot
    Sync(SyncArgs),
    /// Delete the snapshot and rebuild it from every observation file
    Rebuild(RebuildArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncArgs {
    /// Start a new snapshot when none exists
    #[arg(long)]
    pub create_if_missing: bool,

    /// Leave malformed observation files out instead of failing
    #[arg(long)]
    pub skip_malformed: bool,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildArgs {
    /// Leave out files with a path segment containing PATTERN (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Rebuild and print the table without deleting or pushing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Returns the configuration keys set by command line flags.
    ///
    /// Flags left unset do not override file or environment values.
    pub fn overrides(&self) -> Vec<(&'static str, Value)> {
        let mut overrides = Vec::new();

        if let Some(repo_id) = &self.repo_id {
            overrides.push(("dataset.repo_id", Value::from(repo_id.as_str())));
        }
        if let Some(snapshot_path) = &self.snapshot_path {
            overrides.push(("dataset.snapshot_path", Value::from(snapshot_path.as_str())));
        }

        match &self.command {
            Command::Sync(args) => {
                if args.create_if_missing {
                    overrides.push(("sync.create_if_missing", Value::from(true)));
                }
                if args.skip_malformed {
                    overrides.push(("sync.malformed_records", Value::from("skip")));
                }
            }
            Command::Rebuild(args) => {
                if !args.exclude.is_empty() {
                    overrides.push((
                        "rebuild.exclude_patterns",
                        Value::from(args.exclude.clone()),
                    ));
                }
            }
        }

        overrides
    }
}
