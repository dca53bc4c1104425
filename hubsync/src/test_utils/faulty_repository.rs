use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::repository::{CommitOptions, Repository};

/// Which repository calls fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultConfig {
    pub list_files: bool,
    pub download: bool,
    pub file_exists: bool,
    pub delete_file: bool,
    pub upload_file: bool,
}

#[derive(Debug, Default)]
struct CallCounts {
    list_files: AtomicUsize,
    download: AtomicUsize,
    delete_file: AtomicUsize,
    upload_file: AtomicUsize,
}

/// Test wrapper for [`Repository`] implementations that injects failures and counts calls.
///
/// Failing calls return [`ErrorKind::RemoteError`] without reaching the wrapped repository.
#[derive(Debug, Clone)]
pub struct FaultyRepository<R> {
    inner: R,
    config: FaultConfig,
    calls: Arc<CallCounts>,
}

impl<R> FaultyRepository<R> {
    pub fn wrap(inner: R, config: FaultConfig) -> Self {
        Self {
            inner,
            config,
            calls: Arc::new(CallCounts::default()),
        }
    }

    pub fn get_inner(&self) -> &R {
        &self.inner
    }

    pub fn download_calls(&self) -> usize {
        self.calls.download.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete_file.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.calls.upload_file.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list_files.load(Ordering::SeqCst)
    }
}

fn injected(operation: &'static str) -> SyncResult<()> {
    bail!(
        ErrorKind::RemoteError,
        "Injected repository failure",
        operation
    );
}

impl<R> Repository for FaultyRepository<R>
where
    R: Repository + Send + Sync,
{
    fn repo_id(&self) -> &str {
        self.inner.repo_id()
    }

    async fn list_files(&self) -> SyncResult<Vec<String>> {
        self.calls.list_files.fetch_add(1, Ordering::SeqCst);
        if self.config.list_files {
            injected("list_files")?;
        }

        self.inner.list_files().await
    }

    async fn download(&self, path: &str) -> SyncResult<Bytes> {
        self.calls.download.fetch_add(1, Ordering::SeqCst);
        if self.config.download {
            injected("download")?;
        }

        self.inner.download(path).await
    }

    async fn file_exists(&self, path: &str) -> SyncResult<bool> {
        if self.config.file_exists {
            injected("file_exists")?;
        }

        self.inner.file_exists(path).await
    }

    async fn head_commit(&self) -> SyncResult<Option<String>> {
        self.inner.head_commit().await
    }

    async fn delete_file(&self, path: &str, commit: &CommitOptions) -> SyncResult<()> {
        self.calls.delete_file.fetch_add(1, Ordering::SeqCst);
        if self.config.delete_file {
            injected("delete_file")?;
        }

        self.inner.delete_file(path, commit).await
    }

    async fn upload_file(
        &self,
        path: &str,
        content: Bytes,
        commit: &CommitOptions,
    ) -> SyncResult<()> {
        self.calls.upload_file.fetch_add(1, Ordering::SeqCst);
        if self.config.upload_file {
            injected("upload_file")?;
        }

        self.inner.upload_file(path, content, commit).await
    }
}
