use serde::{Deserialize, Serialize};

/// What the merge does with an observation file it cannot parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Leave the file out of the snapshot, count it as rejected and continue.
    Skip,
}

/// Policy knobs shared by the sync and rebuild flows.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Start from a blank table when no snapshot exists yet.
    ///
    /// When `false`, a missing snapshot makes the sync report an unknown outcome.
    #[serde(default)]
    pub create_if_missing: bool,
    /// Handling of observation files that are not valid records.
    #[serde(default)]
    pub malformed_records: MalformedRecordPolicy,
    /// Refuse to commit when the repository revision moved since the run started.
    #[serde(default)]
    pub guard_concurrent_writes: bool,
}
