//! # Design
//!
//! - Job-level errors; every fatal condition of a run surfaces as one of these.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error as StdError;
use std::path::PathBuf;

use stowage_config::ConfigError;
use stowage_fs::FsError;
use thiserror::Error;

/// Result alias for output engine operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Errors raised while running an output job.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A filesystem call failed after retries, or failed with a non-retryable error.
    #[error("filesystem operation failed during {operation}")]
    Fs {
        /// Operation identifier.
        operation: &'static str,
        /// Source filesystem error.
        source: FsError,
    },
    /// The job description is invalid.
    #[error("invalid job configuration")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// The requested operation is not supported.
    #[error("{operation} is not supported by this output")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// A task writer was driven out of order.
    #[error("task {task_index} cannot {operation} while {state}")]
    InvalidState {
        /// Index of the misused writer.
        task_index: usize,
        /// Operation that was attempted.
        operation: &'static str,
        /// Description of the writer state.
        state: &'static str,
    },
    /// Staging workspace allocation or promotion failed.
    #[error("staging {operation} failed for `{path}`: {reason}")]
    Staging {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Failure description.
        reason: &'static str,
    },
    /// Pre-run deletion reported that a matched path was not removed.
    #[error("failed to remove `{path}` before writing")]
    RemoveFailed {
        /// Path that was not removed.
        path: PathBuf,
    },
    /// The host runtime reported a failed task.
    #[error("task {task_index} failed")]
    TaskFailed {
        /// Index of the failed task.
        task_index: usize,
        /// Source task error.
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl OutputError {
    /// Adapter for `map_err` that tags a filesystem error with `operation`.
    ///
    /// Pre-run deletions that report nothing removed become [`OutputError::RemoveFailed`].
    pub fn fs(operation: &'static str) -> impl FnOnce(FsError) -> Self {
        move |source| match source {
            FsError::RemoveFailed { path } => Self::RemoveFailed { path },
            source => Self::Fs { operation, source },
        }
    }

    /// Adapter for `map_err` that tags a configuration error with `operation`.
    pub fn config(operation: &'static str) -> impl FnOnce(ConfigError) -> Self {
        move |source| Self::Config { operation, source }
    }

    /// Wrap a host-runtime failure for task `task_index`.
    pub fn task_failed(
        task_index: usize,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::TaskFailed {
            task_index,
            source: source.into(),
        }
    }

    /// Whether the error is an existence conflict raised by the filesystem.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Fs {
                source: FsError::AlreadyExists { .. },
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn fs_adapter_lifts_remove_failures() {
        let lifted = OutputError::fs("before_run")(FsError::RemoveFailed {
            path: PathBuf::from("/out/data_000.00.csv"),
        });
        assert!(matches!(lifted, OutputError::RemoveFailed { .. }));

        let wrapped = OutputError::fs("write")(FsError::AlreadyExists {
            path: PathBuf::from("/out/data_000.00.csv"),
        });
        assert!(wrapped.is_already_exists());
    }

    #[test]
    fn task_failures_keep_their_source() {
        let err = OutputError::task_failed(2, io::Error::other("input vanished"));
        assert_eq!(err.to_string(), "task 2 failed");
        let source = StdError::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("input vanished"));
    }
}
