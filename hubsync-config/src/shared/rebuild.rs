use serde::{Deserialize, Serialize};

/// Settings specific to full rebuilds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RebuildConfig {
    /// Observation files with a path segment containing any of these patterns are left out.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}
