use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Environment variables consulted, in order, when no token is configured.
///
/// Both names have been used by the scheduled jobs that invoke the sync.
pub const TOKEN_ENV_VARS: &[&str] = &["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"];

/// Connection settings for the data hub.
///
/// This intentionally does not implement [`Serialize`] since it carries the access token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HubConfig {
    /// Base URL of the hub, without a trailing path.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Branch or revision that listings, downloads and commits target.
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Access token. Falls back to [`TOKEN_ENV_VARS`] when unset.
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HubConfig {
    /// Default hub endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://huggingface.co";

    /// Default revision.
    pub const DEFAULT_REVISION: &'static str = "main";

    /// Default per-request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Returns the configured token, or the first token found in [`TOKEN_ENV_VARS`].
    ///
    /// Returns [`None`] when no token is available, in which case requests are anonymous.
    pub fn resolve_token(&self) -> Option<SecretString> {
        self.resolve_token_with(|name| std::env::var(name).ok())
    }

    /// Same as [`HubConfig::resolve_token`] with an explicit variable lookup.
    pub fn resolve_token_with<F>(&self, lookup: F) -> Option<SecretString>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = &self.token
            && !token.expose_secret().is_empty()
        {
            return Some(token.clone());
        }

        TOKEN_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.is_empty())
            .map(SecretString::new)
    }

    /// Validates the hub settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ValidationError::InvalidEndpoint(self.endpoint.clone()));
        }

        if self.revision.is_empty() {
            return Err(ValidationError::EmptyField("hub.revision"));
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "hub.timeout_secs",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            revision: default_revision(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Same as [`HubConfig`] but without the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfigWithoutSecrets {
    pub endpoint: String,
    pub revision: String,
    pub timeout_secs: u64,
}

impl From<HubConfig> for HubConfigWithoutSecrets {
    fn from(value: HubConfig) -> Self {
        HubConfigWithoutSecrets {
            endpoint: value.endpoint,
            revision: value.revision,
            timeout_secs: value.timeout_secs,
        }
    }
}

fn default_endpoint() -> String {
    HubConfig::DEFAULT_ENDPOINT.to_string()
}

fn default_revision() -> String {
    HubConfig::DEFAULT_REVISION.to_string()
}

fn default_timeout_secs() -> u64 {
    HubConfig::DEFAULT_TIMEOUT_SECS
}
