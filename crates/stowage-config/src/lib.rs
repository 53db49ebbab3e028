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

//! Job configuration for sequenced file output.
//!
//! Layout: `model.rs` (serde documents and the resolved `JobSpec`), `validate.rs`
//! (legacy mode translation and job-start validation), `sequence.rs` (printf-style
//! sequence formats), `template.rs` (strftime expansion of path prefixes),
//! `loader.rs` (reading job documents from disk).

pub mod error;
pub mod loader;
pub mod model;
pub mod sequence;
pub mod template;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_output_config, parse_output_config};
pub use model::{
    ConnectionSettings, DeleteInAdvancePolicy, JobSpec, Mode, OutputConfig, RetrySettings,
};
pub use sequence::SequenceFormat;
pub use template::expand_time_template;
pub use validate::resolve_mode;
