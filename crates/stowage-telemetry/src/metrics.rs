//! Counters recorded by output jobs.
//!
//! A [`Metrics`] value owns its own prometheus registry and is handed to the
//! components that record into it; nothing is registered process-wide, so two jobs
//! (or two tests) never share counters.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{TelemetryError, TelemetryResult};

const FS_RETRIES: &str = "stowage_fs_retries_total";
const FILES_CREATED: &str = "stowage_files_created_total";
const BYTES_WRITTEN: &str = "stowage_bytes_written_total";
const JOBS: &str = "stowage_jobs_total";

/// Cloneable handle on one job's counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<Counters>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("files_created", &self.files_created())
            .field("bytes_written", &self.bytes_written())
            .finish_non_exhaustive()
    }
}

struct Counters {
    registry: Registry,
    fs_retries: IntCounterVec,
    files_created: IntCounter,
    bytes_written: IntCounter,
    jobs: IntCounterVec,
}

impl Metrics {
    /// Fresh registry holding the four stowage counters, all at zero.
    ///
    /// # Errors
    ///
    /// Fails when a counter cannot be built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();
        let fs_retries = add(
            &registry,
            FS_RETRIES,
            IntCounterVec::new(
                Opts::new(FS_RETRIES, "Filesystem calls retried after a failure"),
                &["operation"],
            ),
        )?;
        let files_created = add(
            &registry,
            FILES_CREATED,
            IntCounter::with_opts(Opts::new(FILES_CREATED, "Output files created")),
        )?;
        let bytes_written = add(
            &registry,
            BYTES_WRITTEN,
            IntCounter::with_opts(Opts::new(BYTES_WRITTEN, "Bytes appended to output files")),
        )?;
        let jobs = add(
            &registry,
            JOBS,
            IntCounterVec::new(
                Opts::new(JOBS, "Output jobs finished, by mode and outcome"),
                &["mode", "outcome"],
            ),
        )?;

        Ok(Self {
            inner: Arc::new(Counters {
                registry,
                fs_retries,
                files_created,
                bytes_written,
                jobs,
            }),
        })
    }

    /// Increment the retry counter for a filesystem operation.
    pub fn inc_fs_retry(&self, operation: &str) {
        self.inner
            .fs_retries
            .with_label_values(&[operation])
            .inc();
    }

    /// Record a newly created output file.
    pub fn inc_file_created(&self) {
        self.inner.files_created.inc();
    }

    /// Record bytes appended to an output file.
    pub fn add_bytes_written(&self, bytes: usize) {
        self.inner
            .bytes_written
            .inc_by(u64::try_from(bytes).unwrap_or(u64::MAX));
    }

    /// Record a finished job.
    pub fn inc_job(&self, mode: &str, outcome: &str) {
        self.inner
            .jobs
            .with_label_values(&[mode, outcome])
            .inc();
    }

    /// Number of retries recorded for `operation`.
    #[must_use]
    pub fn fs_retries(&self, operation: &str) -> u64 {
        self.inner
            .fs_retries
            .with_label_values(&[operation])
            .get()
    }

    /// Number of output files created so far.
    #[must_use]
    pub fn files_created(&self) -> u64 {
        self.inner.files_created.get()
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.inner.bytes_written.get()
    }

    /// Number of jobs recorded for the given mode and outcome.
    #[must_use]
    pub fn jobs(&self, mode: &str, outcome: &str) -> u64 {
        self.inner.jobs.with_label_values(&[mode, outcome]).get()
    }

    /// Text exposition of every counter.
    ///
    /// # Errors
    ///
    /// Fails when encoding fails or yields non-UTF-8 bytes.
    pub fn render(&self) -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }
}

fn add<C>(
    registry: &Registry,
    name: &'static str,
    built: prometheus::Result<C>,
) -> TelemetryResult<C>
where
    C: Collector + Clone + 'static,
{
    let collector = built.map_err(TelemetryError::collector(name, "built"))?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(TelemetryError::collector(name, "registered"))?;
    Ok(collector)
}
