//! The two end-to-end flows run by the binary.
//!
//! [`sync_dataset`] appends new observations to the existing snapshot, while
//! [`rebuild_dataset`] discards the snapshot and regenerates it from every observation file.

mod rebuild;
mod sync;

pub use rebuild::{RebuildReport, rebuild_dataset};
pub use sync::{SyncOutcome, sync_dataset};

use crate::error::SyncResult;
use crate::repository::Repository;

/// Returns the commit to pin writes to, when concurrent writes must be detected.
async fn parent_commit<R>(repository: &R, guard: bool) -> SyncResult<Option<String>>
where
    R: Repository,
{
    if !guard {
        return Ok(None);
    }

    repository.head_commit().await
}
