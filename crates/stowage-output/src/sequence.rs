//! Deterministic output paths.

use std::path::{Path, PathBuf};

use stowage_config::{ConfigError, JobSpec, SequenceFormat};

use crate::error::{OutputError, OutputResult};

/// Maps `(task index, file counter)` to `prefix + format(task, counter) + extension`.
#[derive(Debug, Clone)]
pub struct PathSequencer {
    prefix: String,
    format: SequenceFormat,
    extension: String,
}

impl PathSequencer {
    /// Build a sequencer for one effective prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>, format: SequenceFormat, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            format,
            extension: extension.into(),
        }
    }

    /// Sequencer over the job's own prefix.
    #[must_use]
    pub fn for_job(spec: &JobSpec) -> Self {
        Self::new(
            spec.path_prefix(),
            spec.sequence_format().clone(),
            spec.file_ext(),
        )
    }

    /// Prefix every path starts with.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path of file `counter` written by task `task_index`.
    #[must_use]
    pub fn next_path(&self, task_index: usize, counter: usize) -> PathBuf {
        PathBuf::from(format!(
            "{}{}{}",
            self.prefix,
            self.format.render(task_index, counter),
            self.extension
        ))
    }
}

/// Directory holding the first file task 0 would write.
///
/// # Errors
///
/// Returns a configuration error when that path has no parent directory.
pub fn sample_output_dir(spec: &JobSpec) -> OutputResult<PathBuf> {
    let sample = spec.sample_path();
    Path::new(&sample)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            OutputError::config("sample_output_dir")(ConfigError::InvalidField {
                field: "path_prefix",
                value: Some(spec.path_prefix().to_string()),
                reason: "must include a parent directory",
            })
        })
}
