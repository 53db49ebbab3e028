//! Job-level transaction and the per-task opener handed to the host runtime.
//!
//! # Design
//! - `transaction` is strictly sequential around the writer phase: the pre-run step
//!   finishes before the host runtime can open a writer, and the post-run step starts
//!   only after the host runtime returns every task report.
//! - Shared state travels in an explicit [`OutputContext`] rather than process globals.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use stowage_config::{JobSpec, Mode};
use stowage_fs::{FileSystem, RetryPolicy, RetryingClient};
use stowage_telemetry::Metrics;
use tracing::{info, warn};

use crate::error::{OutputError, OutputResult};
use crate::tx::{Tx, WriterSettings};
use crate::writer::{TaskReport, TaskWriter};

/// Filesystem client and metrics shared by every component of one job.
#[derive(Debug, Clone)]
pub struct OutputContext {
    client: RetryingClient,
    metrics: Metrics,
}

impl OutputContext {
    /// Wrap `fs` with `policy`, recording into `metrics`.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, policy: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            client: RetryingClient::new(fs, policy, metrics.clone()),
            metrics,
        }
    }

    /// Connect to the filesystem described by the job's connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be constructed.
    pub fn connect(spec: &JobSpec, metrics: Metrics) -> OutputResult<Self> {
        let fs = stowage_fs::connect(spec.connection()).map_err(OutputError::fs("connect"))?;
        Ok(Self::new(fs, RetryPolicy::from(spec.retry()), metrics))
    }

    /// Retry-wrapped filesystem client.
    #[must_use]
    pub const fn client(&self) -> &RetryingClient {
        &self.client
    }

    /// Metrics sink.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Paths written by a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Mode the job ran under.
    pub mode: Mode,
    /// Every created path, grouped by task in task order.
    pub files: Vec<PathBuf>,
}

/// Opens task writers during the writer phase of a transaction.
#[derive(Debug, Clone)]
pub struct TaskOpener {
    tx: Tx,
    spec: Arc<JobSpec>,
    settings: WriterSettings,
    client: RetryingClient,
}

impl TaskOpener {
    /// Writer for `task_index`.
    #[must_use]
    pub fn open(&self, task_index: usize) -> TaskWriter {
        self.tx
            .new_writer(&self.spec, &self.settings, &self.client, task_index)
    }

    /// Prefix writers opened here will use.
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.settings.path_prefix
    }
}

/// One output job: a resolved description plus its filesystem context.
#[derive(Debug)]
pub struct OutputJob {
    spec: Arc<JobSpec>,
    context: OutputContext,
    tx: Tx,
}

impl OutputJob {
    /// Prepare a job; nothing touches the filesystem until [`OutputJob::transaction`].
    #[must_use]
    pub fn new(spec: JobSpec, context: OutputContext) -> Self {
        let tx = Tx::from(spec.mode());
        Self {
            spec: Arc::new(spec),
            context,
            tx,
        }
    }

    /// Resolved job description.
    #[must_use]
    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// Run the pre-run step, let `control` drive the writers, then run the post-run step.
    ///
    /// `control` receives a [`TaskOpener`] and must return one [`TaskReport`] per task.
    /// The filesystem client is closed once the job ends, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error from either step or from `control`; no partial
    /// report is produced.
    pub fn transaction<F>(&self, control: F) -> OutputResult<JobReport>
    where
        F: FnOnce(&TaskOpener) -> OutputResult<Vec<TaskReport>>,
    {
        let mode = self.tx.mode();
        info!(mode = %mode, prefix = %self.spec.path_prefix(), "output transaction started");

        let result = self.run(control);
        let closed = self
            .context
            .client()
            .close()
            .map_err(OutputError::fs("close"));

        let outcome = match (&result, &closed) {
            (Ok(_), Ok(())) => "success",
            _ => "failure",
        };
        self.context.metrics().inc_job(mode.as_str(), outcome);

        let report = match (result, closed) {
            (Ok(report), Ok(())) => report,
            (Ok(_), Err(err)) => return Err(err),
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close filesystem after job failure");
                }
                return Err(err);
            }
        };
        info!(mode = %mode, files = report.files.len(), "output transaction committed");
        Ok(report)
    }

    /// Resuming an interrupted job is not supported. No filesystem connection is
    /// needed to find that out.
    ///
    /// # Errors
    ///
    /// Always returns [`OutputError::Unsupported`].
    pub fn resume(spec: &JobSpec) -> OutputResult<JobReport> {
        warn!(mode = %spec.mode(), prefix = %spec.path_prefix(), "resume requested");
        Err(OutputError::Unsupported {
            operation: "resuming an output job",
        })
    }

    fn run<F>(&self, control: F) -> OutputResult<JobReport>
    where
        F: FnOnce(&TaskOpener) -> OutputResult<Vec<TaskReport>>,
    {
        let client = self.context.client();
        let plan = self.tx.before_run(&self.spec, client)?;
        let opener = TaskOpener {
            tx: self.tx,
            spec: Arc::clone(&self.spec),
            settings: plan.writer.clone(),
            client: client.clone(),
        };

        let mut reports = control(&opener)?;
        reports.sort_by_key(|report| report.task_index);
        self.tx.after_run(plan, client)?;

        let files = reports.into_iter().flat_map(|report| report.files).collect();
        Ok(JobReport {
            mode: self.tx.mode(),
            files,
        })
    }
}
