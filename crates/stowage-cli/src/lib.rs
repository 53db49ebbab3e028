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
#![allow(clippy::redundant_pub_crate)]

//! Command-line host runtime for stowage output jobs.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `runtime.rs`: feeds input files to parallel task writers
//! - `output.rs`: renderers for reports and plans
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod output;
pub(crate) mod runtime;

pub use cli::run;
