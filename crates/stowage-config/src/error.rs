//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was missing or empty.
    #[error("missing required configuration field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Mode name was not recognised.
    #[error("unknown mode `{value}`; supported modes are {supported}")]
    InvalidMode {
        /// Mode payload provided by the caller.
        value: String,
        /// Rendered list of supported modes.
        supported: String,
    },
    /// `mode` was combined with the deprecated `overwrite` / `delete_in_advance` options.
    #[error("`mode` option cannot be used with `overwrite` option or `delete_in_advance` option")]
    ConflictingMode,
    /// Sequence format could not be parsed.
    #[error("invalid sequence format `{value}`: {reason}")]
    InvalidSequenceFormat {
        /// Sequence format provided by the caller.
        value: String,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Path template contained an invalid strftime item.
    #[error("invalid time placeholder in `{value}`")]
    InvalidTimeTemplate {
        /// Template provided by the caller.
        value: String,
    },
    /// File system operation failed while reading configuration.
    #[error("failed to {operation} `{path}`")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// JSON payload could not be decoded.
    #[error("failed to {operation} `{path}`")]
    Json {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn sequence(value: &str, reason: &'static str) -> Self {
        Self::InvalidSequenceFormat {
            value: value.to_string(),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
