//! Mode strategies: what runs before the writers start and after they all commit.
//!
//! # Design
//! - One variant per [`Mode`]; dispatch is a plain `match`.
//! - `before_run` yields a [`TxPlan`] carrying the effective prefix and overwrite flag
//!   every writer uses, plus the staging state `after_run` consumes exactly once.

use std::path::{Path, PathBuf};

use stowage_config::{ConfigError, JobSpec, Mode};
use stowage_fs::RetryingClient;
use tracing::{debug, info};

use crate::error::{OutputError, OutputResult};
use crate::sequence::{PathSequencer, sample_output_dir};
use crate::staging::StagingWorkspace;
use crate::writer::TaskWriter;

/// Strategy selected by a job's [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tx {
    /// Fail when a target file exists.
    AbortIfExist,
    /// Replace existing files in place.
    Overwrite,
    /// Delete files matching `prefix*` first.
    DeleteFilesInAdvance,
    /// Delete files and directories matching `prefix*` first.
    DeleteRecursiveInAdvance,
    /// Stage everything in a workspace and promote it afterwards.
    Replace,
}

impl From<Mode> for Tx {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::AbortIfExist => Self::AbortIfExist,
            Mode::Overwrite => Self::Overwrite,
            Mode::DeleteFilesInAdvance => Self::DeleteFilesInAdvance,
            Mode::DeleteRecursiveInAdvance => Self::DeleteRecursiveInAdvance,
            Mode::Replace => Self::Replace,
        }
    }
}

/// Prefix and overwrite flag handed to every writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterSettings {
    /// Effective path prefix.
    pub path_prefix: String,
    /// Whether `create` may replace an existing file.
    pub overwrite: bool,
}

/// Staging state produced by the replace strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedOutput {
    /// Workspace owned by the job.
    pub workspace: StagingWorkspace,
    /// Directory writers populate inside the workspace.
    pub staged_dir: PathBuf,
    /// Directory the staged output replaces.
    pub final_dir: PathBuf,
}

/// Outcome of [`Tx::before_run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPlan {
    /// Settings every writer uses.
    pub writer: WriterSettings,
    /// Present only for [`Tx::Replace`].
    pub staging: Option<StagedOutput>,
}

impl Tx {
    /// Mode this strategy implements.
    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::AbortIfExist => Mode::AbortIfExist,
            Self::Overwrite => Mode::Overwrite,
            Self::DeleteFilesInAdvance => Mode::DeleteFilesInAdvance,
            Self::DeleteRecursiveInAdvance => Mode::DeleteRecursiveInAdvance,
            Self::Replace => Mode::Replace,
        }
    }

    /// Run the pre-run step. Must complete before any writer is constructed.
    ///
    /// # Errors
    ///
    /// Returns an error when pre-run deletion or workspace preparation fails.
    pub fn before_run(self, spec: &JobSpec, client: &RetryingClient) -> OutputResult<TxPlan> {
        let prefix = spec.path_prefix().to_string();
        match self {
            Self::AbortIfExist => Ok(Self::direct(prefix, false)),
            Self::Overwrite => Ok(Self::direct(prefix, true)),
            Self::DeleteFilesInAdvance => {
                let pattern = format!("{prefix}*");
                info!(pattern = %pattern, "deleting files in advance (files only)");
                let removed = client
                    .glob_and_remove_files(Path::new(&pattern))
                    .map_err(OutputError::fs("delete files in advance"))?;
                debug!(removed, "pre-run deletion finished");
                Ok(Self::direct(prefix, true))
            }
            Self::DeleteRecursiveInAdvance => {
                let pattern = format!("{prefix}*");
                info!(pattern = %pattern, "deleting files and directories in advance");
                let removed = client
                    .glob_and_remove_recursive(Path::new(&pattern))
                    .map_err(OutputError::fs("delete recursively in advance"))?;
                debug!(removed, "pre-run deletion finished");
                Ok(Self::direct(prefix, true))
            }
            Self::Replace => Self::prepare_staging(spec, client),
        }
    }

    /// Construct the writer for `task_index` under `settings`.
    #[must_use]
    pub fn new_writer(
        self,
        spec: &JobSpec,
        settings: &WriterSettings,
        client: &RetryingClient,
        task_index: usize,
    ) -> TaskWriter {
        debug!(mode = %self.mode(), task_index, prefix = %settings.path_prefix, "opening task writer");
        let sequencer = PathSequencer::new(
            settings.path_prefix.clone(),
            spec.sequence_format().clone(),
            spec.file_ext(),
        );
        TaskWriter::new(task_index, sequencer, settings.overwrite, client.clone())
    }

    /// Run the post-run step. Only called after every writer committed.
    ///
    /// # Errors
    ///
    /// Returns an error when promotion of staged output fails; the workspace is then
    /// left in place.
    pub fn after_run(self, plan: TxPlan, client: &RetryingClient) -> OutputResult<()> {
        match (self, plan.staging) {
            (Self::Replace, Some(staged)) => {
                staged
                    .workspace
                    .promote(client, &staged.staged_dir, &staged.final_dir)?;
                staged.workspace.retire(client);
                Ok(())
            }
            (Self::Replace, None) => Err(OutputError::Staging {
                operation: "promote",
                path: PathBuf::new(),
                reason: "no staging workspace was prepared",
            }),
            _ => Ok(()),
        }
    }

    const fn direct(path_prefix: String, overwrite: bool) -> TxPlan {
        TxPlan {
            writer: WriterSettings {
                path_prefix,
                overwrite,
            },
            staging: None,
        }
    }

    fn prepare_staging(spec: &JobSpec, client: &RetryingClient) -> OutputResult<TxPlan> {
        if spec.sequence_format().contains_separator() {
            return Err(OutputError::config("before_run")(ConfigError::InvalidField {
                field: "sequence_format",
                value: Some(spec.sequence_format().to_string()),
                reason: "must not include `/` in replace mode",
            }));
        }

        let final_dir = sample_output_dir(spec)?;
        if spec.workspace().starts_with(&final_dir) {
            return Err(OutputError::Staging {
                operation: "allocate",
                path: spec.workspace().to_path_buf(),
                reason: "workspace must not be inside the output directory it replaces",
            });
        }

        let workspace = StagingWorkspace::allocate(spec.workspace());
        let staged_dir = workspace.staged_path(&final_dir);
        let created = client
            .mkdirs(&staged_dir)
            .map_err(OutputError::fs("create staging directory"))?;
        if !created {
            return Err(OutputError::Staging {
                operation: "allocate",
                path: staged_dir,
                reason: "filesystem reported the directory was not created",
            });
        }
        info!(
            workspace = %workspace.path().display(),
            staged = %staged_dir.display(),
            "staging workspace prepared"
        );

        Ok(TxPlan {
            writer: WriterSettings {
                path_prefix: workspace.staged_prefix(spec.path_prefix()),
                overwrite: true,
            },
            staging: Some(StagedOutput {
                workspace,
                staged_dir,
                final_dir,
            }),
        })
    }
}
