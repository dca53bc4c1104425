//! Shared configuration types for hubsync flows and binaries.

mod app;
mod base;
mod dataset;
mod hub;
mod rebuild;
mod sentry;
mod sync;

pub use app::{AppConfig, AppConfigWithoutSecrets};
pub use base::ValidationError;
pub use dataset::DatasetConfig;
pub use hub::{HubConfig, HubConfigWithoutSecrets, TOKEN_ENV_VARS};
pub use rebuild::RebuildConfig;
pub use sentry::SentryConfig;
pub use sync::{MalformedRecordPolicy, SyncConfig};
