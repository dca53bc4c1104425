use secrecy::SecretString;
use serde::Deserialize;

/// Sentry error reporting configuration.
///
/// When present, the runner initializes Sentry and captures failed runs.
#[derive(Debug, Clone, Deserialize)]
pub struct SentryConfig {
    /// Sentry DSN (Data Source Name) for error reporting.
    pub dsn: SecretString,
}
