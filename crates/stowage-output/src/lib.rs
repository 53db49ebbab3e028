#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Transactional output engine: sequenced task writers plus the per-mode pre-run and
//! post-run steps that keep the target namespace consistent.
//!
//! Layout: `error.rs` (OutputError), `sequence.rs` (path derivation), `writer.rs`
//! (per-task writer lifecycle), `staging.rs` (replace-mode workspaces), `tx.rs` (mode
//! strategies), `job.rs` (job-level transaction and task opener).

pub mod error;
pub mod job;
pub mod sequence;
pub mod staging;
pub mod tx;
pub mod writer;

pub use error::{OutputError, OutputResult};
pub use job::{JobReport, OutputContext, OutputJob, TaskOpener};
pub use sequence::{PathSequencer, sample_output_dir};
pub use staging::{StagingWorkspace, WORKSPACE_NAME_PREFIX};
pub use tx::{StagedOutput, Tx, TxPlan, WriterSettings};
pub use writer::{TaskReport, TaskWriter};
