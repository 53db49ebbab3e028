//! # Design
//!
//! - Structured errors for filesystem calls, carrying the operation and path involved.
//! - Preserve source errors; callers render the chain when reporting.
//! - Classify which failures are worth retrying.

use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Errors produced by filesystem backends and the retry facade.
#[derive(Debug, Error)]
pub enum FsError {
    /// IO failures while interacting with the filesystem.
    #[error("filesystem {operation} failed for `{path}`")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The target path already exists and overwriting was not allowed.
    #[error("`{path}` already exists")]
    AlreadyExists {
        /// Path that already exists.
        path: PathBuf,
    },
    /// A delete call reported that nothing was removed.
    #[error("failed to remove `{path}`")]
    RemoveFailed {
        /// Path that could not be removed.
        path: PathBuf,
    },
    /// Glob pattern compilation failures.
    #[error("invalid glob pattern `{pattern}`")]
    Glob {
        /// Glob pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// Directory traversal failures.
    #[error("filesystem {operation} traversal failed under `{path}`")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Connection property files could not be decoded.
    #[error("invalid connection properties in `{path}`")]
    ConnectionConfig {
        /// Property file that failed to decode.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Unsupported backend or operation.
    #[error("unsupported filesystem {operation}: {value}")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Value that triggered the unsupported error.
        value: String,
    },
}

impl FsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether repeating the call could succeed.
    ///
    /// Every failure is treated as transient except existence conflicts and failures
    /// that are deterministic in their input (bad glob patterns, unsupported backends).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyExists { .. } | Self::Glob { .. } | Self::Unsupported { .. }
        )
    }

    /// Render the error together with its source chain.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}
