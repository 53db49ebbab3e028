//! Private staging workspaces for replace-mode jobs.
//!
//! # Design
//! - A workspace name combines a nanosecond timestamp and a random UUID, so concurrent
//!   jobs sharing one root never collide and no locking is needed.
//! - Staged paths mirror the final layout underneath the workspace directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use stowage_fs::RetryingClient;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OutputError, OutputResult};

/// Fixed leading component of every workspace directory name.
pub const WORKSPACE_NAME_PREFIX: &str = "embulk-output-hdfs";

/// Directory exclusively owned by one job for building output before promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingWorkspace {
    path: PathBuf,
}

impl StagingWorkspace {
    /// Pick a fresh workspace path under `root`; nothing is created yet.
    #[must_use]
    pub fn allocate(root: &Path) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let name = format!("{WORKSPACE_NAME_PREFIX}_{nanos}_{}", Uuid::new_v4());
        Self {
            path: root.join(name),
        }
    }

    /// Workspace directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location inside the workspace that mirrors `target`.
    #[must_use]
    pub fn staged_path(&self, target: &Path) -> PathBuf {
        PathBuf::from(self.staged_prefix(&target.to_string_lossy()))
    }

    /// Prefix string inside the workspace that mirrors `prefix`.
    #[must_use]
    pub fn staged_prefix(&self, prefix: &str) -> String {
        let root = self.path.to_string_lossy();
        format!(
            "{}/{}",
            root.trim_end_matches('/'),
            prefix.trim_start_matches('/')
        )
    }

    /// Move `staged_dir` onto `final_dir`, replacing whatever is there.
    ///
    /// # Errors
    ///
    /// Returns an error when the move fails after retries or reports no change.
    pub fn promote(
        &self,
        client: &RetryingClient,
        staged_dir: &Path,
        final_dir: &Path,
    ) -> OutputResult<()> {
        info!(
            staged = %staged_dir.display(),
            target = %final_dir.display(),
            "{} >>> {}",
            staged_dir.display(),
            final_dir.display()
        );
        let moved = client
            .rename_or_copy_directory(staged_dir, final_dir, true)
            .map_err(OutputError::fs("promote"))?;
        if !moved {
            return Err(OutputError::Staging {
                operation: "promote",
                path: staged_dir.to_path_buf(),
                reason: "filesystem reported the directory was not moved",
            });
        }
        Ok(())
    }

    /// Remove the workspace directory; failures are logged and ignored.
    pub fn retire(&self, client: &RetryingClient) {
        match client.delete(&self.path, true) {
            Ok(_) => info!(workspace = %self.path.display(), "staging workspace removed"),
            Err(err) => warn!(
                workspace = %self.path.display(),
                error = %err.detail(),
                "failed to remove staging workspace"
            ),
        }
    }
}
