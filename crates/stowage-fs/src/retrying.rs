//! Retry-wrapped filesystem facade shared by every component of a job.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use stowage_telemetry::Metrics;
use tracing::info;

use crate::client::{FileStatus, FileSystem, OutputStream};
use crate::error::{FsError, FsResult};
use crate::retry::RetryPolicy;

/// Filesystem handle that applies a [`RetryPolicy`] to every call.
#[derive(Clone)]
pub struct RetryingClient {
    fs: Arc<dyn FileSystem>,
    policy: RetryPolicy,
    metrics: Metrics,
}

impl RetryingClient {
    /// Wrap a backend.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, policy: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            fs,
            policy,
            metrics,
        }
    }

    /// Active retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Metrics sink shared with the rest of the job.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn retrying<T>(&self, operation: &'static str, call: impl FnMut() -> FsResult<T>) -> FsResult<T> {
        self.policy
            .run(operation, call, |_, _| self.metrics.inc_fs_retry(operation))
    }

    /// Create a file, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last backend error once retries are exhausted.
    pub fn create(&self, path: &Path, overwrite: bool) -> FsResult<OutputStream> {
        self.retrying("create", || self.fs.create(path, overwrite))
    }

    /// Delete a path, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last backend error once retries are exhausted.
    pub fn delete(&self, path: &Path, recursive: bool) -> FsResult<bool> {
        self.retrying("delete", || self.fs.delete(path, recursive))
    }

    /// Evaluate a glob pattern, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last backend error once retries are exhausted.
    pub fn glob(&self, pattern: &Path) -> FsResult<Vec<FileStatus>> {
        self.retrying("glob", || self.fs.glob(pattern))
    }

    /// Create a directory tree, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last backend error once retries are exhausted.
    pub fn mkdirs(&self, path: &Path) -> FsResult<bool> {
        self.retrying("mkdirs", || self.fs.mkdirs(path))
    }

    /// Move a directory tree, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last backend error once retries are exhausted.
    pub fn rename_or_copy_directory(&self, src: &Path, dst: &Path, overwrite: bool) -> FsResult<bool> {
        self.retrying("rename", || self.fs.rename_or_copy_directory(src, dst, overwrite))
    }

    /// Release the backend connection.
    ///
    /// # Errors
    ///
    /// Returns the last backend error once retries are exhausted.
    pub fn close(&self) -> FsResult<()> {
        self.retrying("close", || self.fs.close())
    }

    /// Append `bytes` to an open stream, retrying transient failures.
    ///
    /// A retried write can repeat bytes that reached the file before the failure.
    ///
    /// # Errors
    ///
    /// Returns the last write error once retries are exhausted.
    pub fn write(&self, stream: &mut OutputStream, path: &Path, bytes: &[u8]) -> FsResult<()> {
        self.retrying("write", || {
            stream
                .write_all(bytes)
                .map_err(|source| FsError::io("write", path, source))
        })
    }

    /// Flush and release an open stream, retrying the flush on transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last flush error once retries are exhausted.
    pub fn close_stream(&self, mut stream: OutputStream, path: &Path) -> FsResult<()> {
        self.retrying("close_stream", || {
            stream
                .flush()
                .map_err(|source| FsError::io("close_stream", path, source))
        })
    }

    /// Delete every regular file matching `pattern`; directories are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::RemoveFailed`] when a matched file could not be removed.
    pub fn glob_and_remove_files(&self, pattern: &Path) -> FsResult<usize> {
        let mut removed = 0;
        for status in self.glob(pattern)? {
            if status.is_directory {
                continue;
            }
            self.remove_matched(&status.path, false)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Delete every file and directory tree matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::RemoveFailed`] when a matched entry could not be removed.
    pub fn glob_and_remove_recursive(&self, pattern: &Path) -> FsResult<usize> {
        let mut removed = 0;
        for status in self.glob(pattern)? {
            self.remove_matched(&status.path, status.is_directory)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn remove_matched(&self, path: &Path, recursive: bool) -> FsResult<()> {
        info!(path = %path.display(), recursive, "deleting existing output");
        if self.delete(path, recursive)? {
            Ok(())
        } else {
            Err(FsError::RemoveFailed {
                path: path.to_path_buf(),
            })
        }
    }
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
