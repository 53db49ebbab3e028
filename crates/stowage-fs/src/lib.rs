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

//! Filesystem access for sequenced output.
//!
//! Layout: `client.rs` (the [`FileSystem`] seam every backend implements),
//! `local.rs` (local-disk backend), `retry.rs` (bounded retry with capped backoff),
//! `retrying.rs` (the retry-wrapped facade used by output jobs), `connect.rs`
//! (backend construction from connection settings).

pub mod client;
pub mod connect;
pub mod error;
pub mod local;
pub mod retry;
pub mod retrying;

pub use client::{FileStatus, FileSystem, OutputStream};
pub use connect::{DEFAULT_FS_KEY, connect, resolve_properties};
pub use error::{FsError, FsResult};
pub use local::LocalFileSystem;
pub use retry::RetryPolicy;
pub use retrying::RetryingClient;
