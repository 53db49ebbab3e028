//! The filesystem seam.
//!
//! # Design
//! - Backends implement [`FileSystem`]; everything above talks to it through
//!   [`crate::RetryingClient`].
//! - Calls are blocking; a single backend instance is shared across task writers.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::FsResult;

/// Writable stream returned by [`FileSystem::create`].
pub type OutputStream = Box<dyn Write + Send>;

/// Path and kind of an entry matched by [`FileSystem::glob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_directory: bool,
}

impl FileStatus {
    /// Status for a regular file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    /// Status for a directory.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
        }
    }
}

/// Operations a remote or local filesystem must provide.
pub trait FileSystem: Send + Sync {
    /// Create `path` (and any missing parents) and open it for writing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FsError::AlreadyExists`] when `path` exists and `overwrite` is
    /// false, or another error when the file cannot be opened.
    fn create(&self, path: &Path, overwrite: bool) -> FsResult<OutputStream>;

    /// Delete `path`; directories require `recursive` unless empty.
    ///
    /// Returns `false` when nothing existed at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry exists but cannot be removed.
    fn delete(&self, path: &Path, recursive: bool) -> FsResult<bool>;

    /// List entries matching a glob pattern, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error when the pattern is invalid or listing fails.
    fn glob(&self, pattern: &Path) -> FsResult<Vec<FileStatus>>;

    /// Create `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    fn mkdirs(&self, path: &Path) -> FsResult<bool>;

    /// Move the directory tree at `src` to `dst`, renaming when possible and copying
    /// otherwise. An existing `dst` is replaced only when `overwrite` is set.
    ///
    /// # Errors
    ///
    /// Returns an error when `src` is missing, `dst` exists without `overwrite`, or the
    /// move fails.
    fn rename_or_copy_directory(&self, src: &Path, dst: &Path, overwrite: bool)
    -> FsResult<bool>;

    /// Release the connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails to shut down cleanly.
    fn close(&self) -> FsResult<()>;
}
