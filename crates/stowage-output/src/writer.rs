//! Per-task writer lifecycle.
//!
//! # Design
//! - `Idle -> HasOpenFile -> Idle ... -> Finished`; `next_file` only picks the path and
//!   the remote file is created by the first `write`, so slots that receive no bytes
//!   leave nothing behind.
//! - Aborting never deletes files that were already created.

use std::io::Write;
use std::mem;
use std::path::{Path, PathBuf};

use serde::Serialize;
use stowage_fs::{OutputStream, RetryingClient};
use tracing::{debug, info, warn};

use crate::error::{OutputError, OutputResult};
use crate::sequence::PathSequencer;

/// Files one task created, returned by [`TaskWriter::commit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Index of the task that wrote the files.
    pub task_index: usize,
    /// Created paths in creation order.
    pub files: Vec<PathBuf>,
}

enum WriterState {
    Idle,
    HasOpenFile {
        path: PathBuf,
        stream: Option<OutputStream>,
    },
    Finished,
}

impl WriterState {
    const fn describe(&self) -> &'static str {
        match self {
            Self::Idle => "no file is selected",
            Self::HasOpenFile { stream: None, .. } => "a file is selected",
            Self::HasOpenFile {
                stream: Some(_), ..
            } => "a file is open",
            Self::Finished => "finished",
        }
    }
}

/// Writes one task's sequence of files.
pub struct TaskWriter {
    task_index: usize,
    sequencer: PathSequencer,
    overwrite: bool,
    client: RetryingClient,
    counter: usize,
    state: WriterState,
    created: Vec<PathBuf>,
}

impl TaskWriter {
    /// Writer for `task_index`, creating files through `client`.
    #[must_use]
    pub fn new(
        task_index: usize,
        sequencer: PathSequencer,
        overwrite: bool,
        client: RetryingClient,
    ) -> Self {
        Self {
            task_index,
            sequencer,
            overwrite,
            client,
            counter: 0,
            state: WriterState::Idle,
            created: Vec::new(),
        }
    }

    /// Index of the task this writer belongs to.
    #[must_use]
    pub const fn task_index(&self) -> usize {
        self.task_index
    }

    /// Path selected by the last `next_file`, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        match &self.state {
            WriterState::HasOpenFile { path, .. } => Some(path),
            WriterState::Idle | WriterState::Finished => None,
        }
    }

    /// Paths created so far.
    #[must_use]
    pub fn created_files(&self) -> &[PathBuf] {
        &self.created
    }

    /// Close the current file, if any, and select the next path in the sequence.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer is finished or closing the current file fails.
    pub fn next_file(&mut self) -> OutputResult<()> {
        if matches!(self.state, WriterState::Finished) {
            return Err(self.invalid("open the next file"));
        }
        self.close_current()?;
        let path = self.sequencer.next_path(self.task_index, self.counter);
        self.counter += 1;
        debug!(task_index = self.task_index, path = %path.display(), "selected next file");
        self.state = WriterState::HasOpenFile { path, stream: None };
        Ok(())
    }

    /// Append `bytes` to the current file, creating it on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error when no file is selected, the writer is finished, or the
    /// filesystem rejects the create or write.
    pub fn write(&mut self, bytes: &[u8]) -> OutputResult<()> {
        let WriterState::HasOpenFile { path, stream } = &mut self.state else {
            return Err(self.invalid("write"));
        };

        let mut open = match stream.take() {
            Some(open) => open,
            None => {
                let created = self
                    .client
                    .create(path, self.overwrite)
                    .map_err(OutputError::fs("create"))?;
                info!(task_index = self.task_index, path = %path.display(), "uploading");
                self.client.metrics().inc_file_created();
                self.created.push(path.clone());
                created
            }
        };
        let written = self.client.write(&mut open, path, bytes);
        *stream = Some(open);
        written.map_err(OutputError::fs("write"))?;
        self.client.metrics().add_bytes_written(bytes.len());
        Ok(())
    }

    /// Close the current file; no further writes are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error when flushing the current file fails.
    pub fn finish(&mut self) -> OutputResult<()> {
        if !matches!(self.state, WriterState::Finished) {
            self.close_current()?;
            self.state = WriterState::Finished;
        }
        Ok(())
    }

    /// Report the files this task created.
    ///
    /// # Errors
    ///
    /// Returns an error unless [`TaskWriter::finish`] ran first.
    pub fn commit(&mut self) -> OutputResult<TaskReport> {
        if !matches!(self.state, WriterState::Finished) {
            return Err(self.invalid("commit"));
        }
        Ok(TaskReport {
            task_index: self.task_index,
            files: mem::take(&mut self.created),
        })
    }

    /// Give up on this task; created files are left in place.
    pub fn abort(&mut self) {
        if !self.created.is_empty() {
            warn!(
                task_index = self.task_index,
                files = self.created.len(),
                "task aborted; created files are left in place"
            );
        }
        self.release();
    }

    /// Release any held stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.release();
    }

    fn close_current(&mut self) -> OutputResult<()> {
        let state = mem::replace(&mut self.state, WriterState::Idle);
        if let WriterState::HasOpenFile {
            path,
            stream: Some(stream),
        } = state
        {
            self.client
                .close_stream(stream, &path)
                .map_err(OutputError::fs("close file"))?;
        }
        Ok(())
    }

    fn release(&mut self) {
        let state = mem::replace(&mut self.state, WriterState::Finished);
        if let WriterState::HasOpenFile {
            path,
            stream: Some(mut stream),
        } = state
            && let Err(err) = stream.flush()
        {
            warn!(
                task_index = self.task_index,
                path = %path.display(),
                error = %err,
                "failed to flush file while releasing writer"
            );
        }
    }

    fn invalid(&self, operation: &'static str) -> OutputError {
        OutputError::InvalidState {
            task_index: self.task_index,
            operation,
            state: self.state.describe(),
        }
    }
}

impl std::fmt::Debug for TaskWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWriter")
            .field("task_index", &self.task_index)
            .field("counter", &self.counter)
            .field("state", &self.state.describe())
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}
