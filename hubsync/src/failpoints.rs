use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

pub const PUBLISH_BEFORE_UPLOAD_FP: &str = "publish.before_upload";
pub const MERGE_AFTER_DOWNLOAD_FP: &str = "merge.after_download";

/// Returns an error when the failpoint `name` is configured to `return`.
///
/// The optional parameter picks the error kind: `remote` (default), `conflict`,
/// `not_found` or `io`.
pub fn sync_fail_point(name: &str) -> SyncResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::RemoteError;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "remote" => ErrorKind::RemoteError,
                "conflict" => ErrorKind::CommitConflict,
                "not_found" => ErrorKind::NotFound,
                "io" => ErrorKind::IoError,
                _ => ErrorKind::RemoteError,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
