//! Renderers for job reports and plans.

use std::path::PathBuf;

use serde::Serialize;
use stowage_config::{JobSpec, Mode, RetrySettings};
use stowage_output::sample_output_dir;

use crate::cli::{CliError, CliResult};

/// Resolved view of a job, printed by `stowage plan` without touching the filesystem.
#[derive(Debug, Serialize)]
pub(crate) struct JobPlan {
    pub(crate) mode: Mode,
    pub(crate) path_prefix: String,
    pub(crate) sample_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) workspace: Option<PathBuf>,
    pub(crate) retry: RetrySettings,
}

impl JobPlan {
    pub(crate) fn from_spec(spec: &JobSpec) -> Self {
        let staged = spec.mode() == Mode::Replace;
        Self {
            mode: spec.mode(),
            path_prefix: spec.path_prefix().to_string(),
            sample_path: spec.sample_path(),
            output_dir: sample_output_dir(spec).ok(),
            workspace: staged.then(|| spec.workspace().to_path_buf()),
            retry: spec.retry(),
        }
    }
}

pub(crate) fn render_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(CliError::failure)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", render_json(value)?);
    Ok(())
}
