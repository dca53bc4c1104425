use std::process::ExitCode;

use hubsync::error::SyncResult;
use hubsync::flows::{RebuildReport, SyncOutcome, rebuild_dataset, sync_dataset};
use hubsync::repository::Repository;
use hubsync::repository::hub::HubRepository;
use hubsync::snapshot::preview;
use hubsync_config::shared::{AppConfig, AppConfigWithoutSecrets};
use tracing::{info, warn};

use crate::cli::Command;
use crate::error::RunnerResult;

/// Number of rows shown when printing a rebuilt table.
const PREVIEW_ROWS: usize = 20;

/// What a finished run produced.
#[derive(Debug)]
pub enum RunReport {
    Sync(SyncOutcome),
    Rebuild {
        report: RebuildReport,
        dry_run: bool,
    },
}

impl RunReport {
    /// Returns `false` when the run completed without a usable result.
    ///
    /// Only a sync that could not tell how many observations are new counts as unsuccessful.
    pub fn succeeded(&self) -> bool {
        match self {
            RunReport::Sync(outcome) => outcome.new_records().is_some(),
            RunReport::Rebuild { .. } => true,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    /// Renders the report for standard output.
    pub fn render(&self) -> SyncResult<String> {
        let rendered = match self {
            RunReport::Sync(outcome) => match outcome.new_records() {
                Some(count) => format!("new observations: {count}"),
                None => "new observations: unknown (snapshot missing)".to_string(),
            },
            RunReport::Rebuild { report, dry_run } => {
                let mut out = format!(
                    "rebuilt {} row(s), {} duplicate(s), {} rejected, snapshot deletion: {:?}, published: {}",
                    report.summary.inserted,
                    report.summary.duplicates.len(),
                    report.summary.rejected.len(),
                    report.deletion,
                    report.published,
                );
                if *dry_run {
                    out.push('\n');
                    out.push_str(&preview(&report.table, PREVIEW_ROWS)?);
                }
                out
            }
        };

        Ok(rendered)
    }
}

/// Runs `command` against the hub repository named in `config`.
pub async fn run_command(config: &AppConfig, command: &Command) -> RunnerResult<RunReport> {
    info!("starting hubsync");
    log_config(config);

    let repository = HubRepository::new(&config.hub, config.dataset.repo_id.as_str())?;
    info!(
        repo_id = repository.repo_id(),
        revision = repository.revision(),
        "connected to hub repository"
    );

    execute(&repository, config, command).await
}

/// Runs `command` against `repository`.
pub async fn execute<R>(
    repository: &R,
    config: &AppConfig,
    command: &Command,
) -> RunnerResult<RunReport>
where
    R: Repository,
{
    let report = match command {
        Command::Sync(_) => {
            let outcome = sync_dataset(repository, &config.dataset, &config.sync).await?;
            match outcome.new_records() {
                Some(count) => info!(new_records = count, "sync finished"),
                None => warn!("sync finished without a snapshot to sync into"),
            }

            RunReport::Sync(outcome)
        }
        Command::Rebuild(args) => {
            let report = rebuild_dataset(
                repository,
                &config.dataset,
                &config.sync,
                &config.rebuild,
                args.dry_run,
            )
            .await?;
            info!(
                rows = report.table.len(),
                published = report.published,
                dry_run = args.dry_run,
                "rebuild finished"
            );

            RunReport::Rebuild {
                report,
                dry_run: args.dry_run,
            }
        }
    };

    Ok(report)
}

fn log_config(config: &AppConfig) {
    let config = AppConfigWithoutSecrets::from(config.clone());
    match serde_json::to_string(&config) {
        Ok(config) => info!(%config, "loaded configuration"),
        Err(err) => warn!(error = %err, "could not serialize configuration for logging"),
    }
}
