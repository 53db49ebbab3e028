//! Minimal host runtime: distributes input files over task writers and runs the tasks
//! in parallel on tokio's blocking pool.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use stowage_output::{
    JobReport, OutputError, OutputJob, OutputResult, TaskOpener, TaskReport, TaskWriter,
};
use tokio::runtime::Handle;
use tokio::task;
use tracing::{debug, error};

const CHUNK_SIZE: usize = 64 * 1024;

/// Inputs and sizing for one run.
#[derive(Debug, Clone)]
pub(crate) struct Feed {
    pub(crate) tasks: usize,
    pub(crate) max_file_bytes: Option<u64>,
    pub(crate) inputs: Vec<PathBuf>,
}

/// Run `job`, feeding each task its share of the inputs.
pub(crate) async fn execute(job: OutputJob, feed: Feed) -> anyhow::Result<JobReport> {
    let handle = Handle::current();
    let assignments = assign_round_robin(feed.inputs, feed.tasks);
    let max_file_bytes = feed.max_file_bytes;

    let report = task::spawn_blocking(move || {
        job.transaction(|opener| {
            handle.block_on(drive_tasks(opener, assignments, max_file_bytes))
        })
    })
    .await
    .context("output job did not run to completion")??;
    Ok(report)
}

pub(crate) fn assign_round_robin(inputs: Vec<PathBuf>, tasks: usize) -> Vec<Vec<PathBuf>> {
    let tasks = tasks.max(1);
    let mut assignments = vec![Vec::new(); tasks];
    for (index, input) in inputs.into_iter().enumerate() {
        assignments[index % tasks].push(input);
    }
    assignments
}

async fn drive_tasks(
    opener: &TaskOpener,
    assignments: Vec<Vec<PathBuf>>,
    max_file_bytes: Option<u64>,
) -> OutputResult<Vec<TaskReport>> {
    let handles: Vec<_> = assignments
        .into_iter()
        .enumerate()
        .map(|(task_index, inputs)| {
            let mut writer = opener.open(task_index);
            let handle =
                task::spawn_blocking(move || feed_task(&mut writer, &inputs, max_file_bytes));
            (task_index, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    let mut failure = None;
    for (task_index, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join) => Err(OutputError::task_failed(task_index, join)),
        };
        match outcome {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!(task_index, error = %err, "task failed");
                failure.get_or_insert(err);
            }
        }
    }
    failure.map_or(Ok(reports), Err)
}

fn feed_task(
    writer: &mut TaskWriter,
    inputs: &[PathBuf],
    max_file_bytes: Option<u64>,
) -> OutputResult<TaskReport> {
    let result = write_inputs(writer, inputs, max_file_bytes).and_then(|()| {
        writer.finish()?;
        writer.commit()
    });
    if result.is_err() {
        writer.abort();
    }
    writer.close();
    result
}

fn write_inputs(
    writer: &mut TaskWriter,
    inputs: &[PathBuf],
    max_file_bytes: Option<u64>,
) -> OutputResult<()> {
    let task_index = writer.task_index();
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    for input in inputs {
        let read_failed = |source: io::Error| {
            OutputError::task_failed(
                task_index,
                anyhow::Error::new(source).context(format!("reading {}", input.display())),
            )
        };
        let mut file = File::open(input).map_err(read_failed)?;
        writer.next_file()?;

        let mut in_file: u64 = 0;
        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(read_failed(err)),
            };
            let chunk_len = u64::try_from(read).unwrap_or(u64::MAX);
            if max_file_bytes
                .is_some_and(|limit| in_file > 0 && in_file.saturating_add(chunk_len) > limit)
            {
                writer.next_file()?;
                in_file = 0;
            }
            writer.write(&buffer[..read])?;
            in_file = in_file.saturating_add(chunk_len);
        }
        debug!(task_index, input = %input.display(), "input consumed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use stowage_config::{JobSpec, parse_output_config};
    use stowage_fs::{LocalFileSystem, RetryPolicy};
    use stowage_output::OutputContext;
    use stowage_telemetry::Metrics;
    use stowage_test_support::fixtures::{list_files, read_text};

    type TestResult<T> = anyhow::Result<T>;

    fn job(root: &Path, mode: &str) -> TestResult<OutputJob> {
        let raw = serde_json::json!({
            "path_prefix": format!("{}/out/part_", root.display()),
            "file_ext": "txt",
            "mode": mode,
            "workspace": root.join("ws").display().to_string(),
        });
        let spec = JobSpec::resolve(parse_output_config(&raw.to_string())?)?;
        let context = OutputContext::new(
            Arc::new(LocalFileSystem::new()),
            RetryPolicy::immediate(3),
            Metrics::new()?,
        );
        Ok(OutputJob::new(spec, context))
    }

    #[test]
    fn inputs_are_assigned_round_robin() {
        let inputs: Vec<PathBuf> = ["a", "b", "c", "d", "e"].iter().map(PathBuf::from).collect();
        let assigned = assign_round_robin(inputs, 2);
        assert_eq!(
            assigned,
            vec![
                vec![PathBuf::from("a"), PathBuf::from("c"), PathBuf::from("e")],
                vec![PathBuf::from("b"), PathBuf::from("d")],
            ]
        );
        assert_eq!(assign_round_robin(Vec::new(), 0).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn execute_writes_one_file_per_input() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let inputs_dir = temp.path().join("inputs");
        fs::create_dir_all(&inputs_dir)?;
        let mut inputs = Vec::new();
        for (name, body) in [("a", "1\n"), ("b", "2\n"), ("c", ""), ("d", "4\n")] {
            let path = inputs_dir.join(name);
            fs::write(&path, body)?;
            inputs.push(path);
        }

        let report = execute(
            job(temp.path(), "replace")?,
            Feed {
                tasks: 2,
                max_file_bytes: None,
                inputs,
            },
        )
        .await?;

        let out = temp.path().join("out");
        assert_eq!(report.files.len(), 3);
        assert_eq!(
            list_files(&out)?,
            vec!["part_000.00.txt", "part_001.00.txt", "part_001.01.txt"]
        );
        assert_eq!(read_text(&out, "part_001.00.txt")?, "2\n");
        assert_eq!(read_text(&out, "part_001.01.txt")?, "4\n");
        assert!(list_files(&temp.path().join("ws"))?.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn large_inputs_rotate_at_the_size_limit() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let input = temp.path().join("big.bin");
        fs::write(&input, vec![b'x'; CHUNK_SIZE * 2 + 100])?;

        let report = execute(
            job(temp.path(), "overwrite")?,
            Feed {
                tasks: 1,
                max_file_bytes: Some(CHUNK_SIZE as u64),
                inputs: vec![input],
            },
        )
        .await?;

        assert_eq!(report.files.len(), 3);
        assert_eq!(
            fs::metadata(temp.path().join("out/part_000.02.txt"))?.len(),
            100
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_inputs_fail_the_job() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let result = execute(
            job(temp.path(), "abort_if_exist")?,
            Feed {
                tasks: 1,
                max_file_bytes: None,
                inputs: vec![temp.path().join("missing.csv")],
            },
        )
        .await;

        let err = result.err().ok_or_else(|| anyhow::anyhow!("job should fail"))?;
        assert!(matches!(
            err.downcast_ref::<OutputError>(),
            Some(OutputError::TaskFailed { task_index: 0, .. })
        ));
        assert!(list_files(&temp.path().join("out"))?.is_empty());
        Ok(())
    }
}
