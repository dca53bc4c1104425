use std::backtrace::BacktraceStatus;
use std::sync::Arc;

use hubsync_config::shared::AppConfig;
use secrecy::ExposeSecret;
use sentry::protocol::{Event, Exception, Stacktrace};
use sentry::types::Uuid;
use tracing::info;

use crate::APP_VERSION_ENV_NAME;
use crate::error::{RunnerError, RunnerResult};

/// Initializes Sentry when a DSN is configured.
///
/// Returns [`None`] when no Sentry section is present, in which case failures are only
/// logged.
pub fn init(config: &AppConfig) -> RunnerResult<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = &config.sentry else {
        info!("sentry not configured, skipping initialization");
        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let dsn = sentry_config
        .dsn
        .expose_secret()
        .parse()
        .map_err(RunnerError::config)?;

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        attach_stacktrace: true,
        ..Default::default()
    });

    let version = std::env::var(APP_VERSION_ENV_NAME);
    let repo_id = config.dataset.repo_id.clone();
    sentry::configure_scope(|scope| {
        scope.set_tag("service", "hubsync");
        scope.set_tag("repo_id", repo_id);
        if let Ok(version) = version {
            scope.set_tag("version", version);
        }
    });

    Ok(Some(guard))
}

/// Captures a [`RunnerError`] to Sentry and returns the event id.
pub fn capture_error(err: &RunnerError) -> Uuid {
    sentry::capture_event(event_from_runner_error(err))
}

/// Converts a [`RunnerError`] into a Sentry [`Event`].
///
/// Sync errors use their error kind as exception type. The source chain follows with the
/// root cause first.
fn event_from_runner_error(err: &RunnerError) -> Event<'static> {
    let mut exceptions = Vec::new();

    let mut current: Option<&(dyn std::error::Error + 'static)> = match err.as_sync_error() {
        Some(sync_err) => {
            exceptions.push(Exception {
                ty: format!("{:?}", sync_err.kind()),
                value: Some(sync_err.to_string()),
                ..Default::default()
            });
            std::error::Error::source(sync_err)
        }
        None => Some(err),
    };
    while let Some(e) = current {
        exceptions.push(Exception {
            ty: type_name_from_debug(e),
            value: Some(e.to_string()),
            ..Default::default()
        });
        current = e.source();
    }
    exceptions.reverse();

    if let Some(stacktrace) = captured_stacktrace(err)
        && let Some(exception) = exceptions.last_mut()
    {
        exception.stacktrace = Some(stacktrace);
    }

    Event {
        exception: exceptions.into(),
        level: sentry::Level::Error,
        ..Default::default()
    }
}

fn captured_stacktrace(err: &RunnerError) -> Option<Stacktrace> {
    let backtrace = err.backtrace();
    if backtrace.status() != BacktraceStatus::Captured {
        return None;
    }

    sentry::integrations::backtrace::parse_stacktrace(&backtrace.to_string())
}

/// Extracts the type name from an error's Debug representation.
fn type_name_from_debug(err: &dyn std::error::Error) -> String {
    let debug = format!("{err:?}");
    debug
        .split(['{', '(', ' '])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use hubsync::error::{ErrorKind, SyncError};

    use super::*;

    #[test]
    fn sync_errors_are_reported_root_cause_first() {
        let err = RunnerError::from(
            SyncError::from((ErrorKind::CommitConflict, "Commit request failed"))
                .with_source(std::io::Error::other("precondition failed")),
        );

        let event = event_from_runner_error(&err);
        let exceptions = &event.exception.values;

        assert_eq!(exceptions.len(), 2);
        assert_eq!(exceptions[0].value.as_deref(), Some("precondition failed"));
        assert_eq!(exceptions[1].ty, "CommitConflict");
    }
}
