//! Fault-injecting filesystem for retry and abort tests.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stowage_fs::{FileStatus, FileSystem, FsError, FsResult, LocalFileSystem, OutputStream};

/// Filesystem call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsCall {
    /// [`FileSystem::create`].
    Create,
    /// [`FileSystem::delete`].
    Delete,
    /// [`FileSystem::glob`].
    Glob,
    /// [`FileSystem::mkdirs`].
    Mkdirs,
    /// [`FileSystem::rename_or_copy_directory`].
    Rename,
    /// [`FileSystem::close`].
    Close,
    /// Writes to a stream returned by `create`.
    Write,
}

impl FsCall {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Glob => "glob",
            Self::Mkdirs => "mkdirs",
            Self::Rename => "rename",
            Self::Close => "close",
            Self::Write => "write",
        }
    }
}

#[derive(Debug, Default)]
struct CallLedger {
    pending_failures: HashMap<FsCall, usize>,
    calls: HashMap<FsCall, usize>,
}

#[derive(Debug, Clone, Default)]
struct SharedLedger(Arc<Mutex<CallLedger>>);

impl SharedLedger {
    fn lock(&self) -> MutexGuard<'_, CallLedger> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: FsCall) -> bool {
        let mut ledger = self.lock();
        *ledger.calls.entry(call).or_default() += 1;
        match ledger.pending_failures.get_mut(&call) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Wraps a backend and fails selected calls with a transient IO error.
#[derive(Clone)]
pub struct FlakyFileSystem {
    inner: Arc<dyn FileSystem>,
    ledger: SharedLedger,
}

impl FlakyFileSystem {
    /// Wrap an arbitrary backend.
    #[must_use]
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        Self {
            inner,
            ledger: SharedLedger::default(),
        }
    }

    /// Wrap the local-disk backend.
    #[must_use]
    pub fn local() -> Self {
        Self::new(Arc::new(LocalFileSystem::new()))
    }

    /// Make the next `times` invocations of `call` fail.
    pub fn fail_next(&self, call: FsCall, times: usize) {
        *self.ledger.lock().pending_failures.entry(call).or_default() += times;
    }

    /// Number of invocations of `call` so far, including failed ones.
    #[must_use]
    pub fn calls(&self, call: FsCall) -> usize {
        self.ledger.lock().calls.get(&call).copied().unwrap_or(0)
    }

    fn check(&self, call: FsCall, path: &Path) -> FsResult<()> {
        if self.ledger.record(call) {
            return Err(FsError::Io {
                operation: call.as_str(),
                path: path.to_path_buf(),
                source: injected(call),
            });
        }
        Ok(())
    }
}

fn injected(call: FsCall) -> io::Error {
    io::Error::other(format!("injected {} failure", call.as_str()))
}

impl FileSystem for FlakyFileSystem {
    fn create(&self, path: &Path, overwrite: bool) -> FsResult<OutputStream> {
        self.check(FsCall::Create, path)?;
        let stream = self.inner.create(path, overwrite)?;
        Ok(Box::new(FlakyStream {
            inner: stream,
            ledger: self.ledger.clone(),
        }))
    }

    fn delete(&self, path: &Path, recursive: bool) -> FsResult<bool> {
        self.check(FsCall::Delete, path)?;
        self.inner.delete(path, recursive)
    }

    fn glob(&self, pattern: &Path) -> FsResult<Vec<FileStatus>> {
        self.check(FsCall::Glob, pattern)?;
        self.inner.glob(pattern)
    }

    fn mkdirs(&self, path: &Path) -> FsResult<bool> {
        self.check(FsCall::Mkdirs, path)?;
        self.inner.mkdirs(path)
    }

    fn rename_or_copy_directory(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
    ) -> FsResult<bool> {
        self.check(FsCall::Rename, src)?;
        self.inner.rename_or_copy_directory(src, dst, overwrite)
    }

    fn close(&self) -> FsResult<()> {
        self.check(FsCall::Close, Path::new(""))?;
        self.inner.close()
    }
}

struct FlakyStream {
    inner: OutputStream,
    ledger: SharedLedger,
}

impl Write for FlakyStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.ledger.record(FsCall::Write) {
            return Err(injected(FsCall::Write));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
