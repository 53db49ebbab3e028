//! Typed configuration models for output jobs.
//!
//! # Design
//! - `OutputConfig` mirrors the JSON job document, including deprecated options.
//! - `JobSpec` is the resolved, immutable view every job component reads from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sequence::SequenceFormat;

const DEFAULT_SEQUENCE_FORMAT: &str = "%03d.%02d.";
const DEFAULT_WORKSPACE: &str = "/tmp";
const DEFAULT_RETRY_LIMIT: u32 = 3;
const DEFAULT_INITIAL_WAIT_MS: u64 = 500;
const DEFAULT_MAX_WAIT_MS: u64 = 10 * 60 * 1000;

/// Raw job document as supplied by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path prefix for every output file; may contain strftime placeholders.
    pub path_prefix: String,
    /// Extension appended verbatim after the sequence suffix.
    pub file_ext: String,
    /// Printf-style template with two integer slots (task index, file counter).
    #[serde(default = "default_sequence_format")]
    pub sequence_format: String,
    /// Seconds subtracted from the current time before expanding `path_prefix`.
    #[serde(default)]
    pub rewind_seconds: i64,
    /// Conflict-resolution mode.
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Deprecated: allow overwriting existing files.
    #[serde(default)]
    pub overwrite: Option<bool>,
    /// Deprecated: delete matching paths before the job runs.
    #[serde(default)]
    pub delete_in_advance: Option<DeleteInAdvancePolicy>,
    /// Root directory for staging workspaces used by `replace` mode.
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Filesystem connection parameters.
    #[serde(flatten)]
    pub connection: ConnectionSettings,
    /// Retry policy for filesystem calls.
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_sequence_format() -> String {
    DEFAULT_SEQUENCE_FORMAT.to_string()
}

fn default_workspace() -> String {
    DEFAULT_WORKSPACE.to_string()
}

/// Parameters used to construct a filesystem client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// JSON files holding string key/value connection properties, applied in order.
    #[serde(default)]
    pub config_files: Vec<PathBuf>,
    /// Connection properties applied after `config_files`.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// User to act as when talking to the filesystem.
    #[serde(default)]
    pub doas: Option<String>,
}

/// Retry policy knobs for filesystem calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per call, including the first.
    #[serde(default = "default_retry_limit")]
    pub limit: u32,
    /// Wait after the first failed attempt, in milliseconds.
    #[serde(default = "default_initial_wait_ms")]
    pub initial_wait_ms: u64,
    /// Ceiling for the growing wait, in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

const fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

const fn default_initial_wait_ms() -> u64 {
    DEFAULT_INITIAL_WAIT_MS
}

const fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT_MS
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRY_LIMIT,
            initial_wait_ms: DEFAULT_INITIAL_WAIT_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

impl RetrySettings {
    /// Wait applied after the first failure.
    #[must_use]
    pub const fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    /// Ceiling for the growing wait.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Job-level policy selecting pre-run and post-run namespace conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Mode {
    /// Fail when a target file already exists.
    #[default]
    AbortIfExist,
    /// Replace existing files in place.
    Overwrite,
    /// Delete files matching `prefix*` before writing.
    DeleteFilesInAdvance,
    /// Delete files and directories matching `prefix*` before writing.
    DeleteRecursiveInAdvance,
    /// Stage output in a workspace and promote it atomically afterwards.
    Replace,
}

impl Mode {
    /// Every mode in declaration order.
    pub const ALL: [Self; 5] = [
        Self::AbortIfExist,
        Self::Overwrite,
        Self::DeleteFilesInAdvance,
        Self::DeleteRecursiveInAdvance,
        Self::Replace,
    ];

    /// Render the mode as its configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AbortIfExist => "abort_if_exist",
            Self::Overwrite => "overwrite",
            Self::DeleteFilesInAdvance => "delete_files_in_advance",
            Self::DeleteRecursiveInAdvance => "delete_recursive_in_advance",
            Self::Replace => "replace",
        }
    }

    /// Whether this is the mode used when none is configured.
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::AbortIfExist)
    }

    fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|mode| format!("`{}`", mode.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| ConfigError::InvalidMode {
                value: value.to_string(),
                supported: Self::supported_list(),
            })
    }
}

impl TryFrom<String> for Mode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Deprecated pre-run deletion policy superseded by [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteInAdvancePolicy {
    /// Delete nothing.
    #[serde(alias = "none")]
    None,
    /// Delete matching files only.
    #[serde(alias = "file_only")]
    FileOnly,
    /// Delete matching files and directories.
    #[serde(alias = "recursive")]
    Recursive,
}

/// Resolved, immutable description of one output job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub(crate) path_prefix: String,
    pub(crate) file_ext: String,
    pub(crate) sequence_format: SequenceFormat,
    pub(crate) mode: Mode,
    pub(crate) workspace: PathBuf,
    pub(crate) connection: ConnectionSettings,
    pub(crate) retry: RetrySettings,
}

impl JobSpec {
    /// Path prefix with time placeholders already expanded.
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Extension appended after the sequence suffix.
    #[must_use]
    pub fn file_ext(&self) -> &str {
        &self.file_ext
    }

    /// Parsed sequence template.
    #[must_use]
    pub const fn sequence_format(&self) -> &SequenceFormat {
        &self.sequence_format
    }

    /// Conflict-resolution mode for the job.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Root directory for staging workspaces.
    #[must_use]
    pub fn workspace(&self) -> &std::path::Path {
        &self.workspace
    }

    /// Filesystem connection parameters.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionSettings {
        &self.connection
    }

    /// Retry policy knobs for filesystem calls.
    #[must_use]
    pub const fn retry(&self) -> RetrySettings {
        self.retry
    }

    /// Path of the first file task 0 would write (`prefix + format(0, 0) + ext`).
    #[must_use]
    pub fn sample_path(&self) -> String {
        format!(
            "{}{}{}",
            self.path_prefix,
            self.sequence_format.render(0, 0),
            self.file_ext
        )
    }
}
