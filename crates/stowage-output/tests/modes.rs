use std::fs;
use std::path::Path;
use std::sync::Arc;

use stowage_config::{JobSpec, Mode, parse_output_config};
use stowage_fs::{FileSystem, FsError, LocalFileSystem, RetryPolicy};
use stowage_output::{JobReport, OutputContext, OutputError, OutputJob, OutputResult};
use stowage_telemetry::Metrics;
use stowage_test_support::fixtures::{child_count, list_files, read_text};
use stowage_test_support::mocks::{FlakyFileSystem, FsCall};

type TestResult<T> = anyhow::Result<T>;

fn job_spec(root: &Path, mode: Mode) -> TestResult<JobSpec> {
    let raw = serde_json::json!({
        "path_prefix": format!("{}/out/data_", root.display()),
        "file_ext": "csv",
        "mode": mode.as_str(),
        "workspace": root.join("ws").display().to_string(),
    });
    Ok(JobSpec::resolve(parse_output_config(&raw.to_string())?)?)
}

fn context(fs: Arc<dyn FileSystem>) -> TestResult<OutputContext> {
    Ok(OutputContext::new(fs, RetryPolicy::immediate(3), Metrics::new()?))
}

/// Each task writes one file per inner slice; an empty slice selects a file but
/// never writes to it.
fn run_job(job: &OutputJob, tasks: &[&[&str]]) -> OutputResult<JobReport> {
    job.transaction(|opener| {
        let mut reports = Vec::new();
        for (task_index, files) in tasks.iter().enumerate() {
            let mut writer = opener.open(task_index);
            for rows in files.split(|row| row.is_empty()) {
                writer.next_file()?;
                for row in rows {
                    writer.write(row.as_bytes())?;
                }
            }
            writer.finish()?;
            reports.push(writer.commit()?);
        }
        Ok(reports)
    })
}

fn local_job(root: &Path, mode: Mode) -> TestResult<OutputJob> {
    Ok(OutputJob::new(
        job_spec(root, mode)?,
        context(Arc::new(LocalFileSystem::new()))?,
    ))
}

fn seed_existing(root: &Path) -> TestResult<()> {
    let out = root.join("out");
    fs::create_dir_all(out.join("data_dir/nested"))?;
    fs::write(out.join("data_000.00.csv"), "old")?;
    fs::write(out.join("data_stale.csv"), "stale")?;
    fs::write(out.join("data_dir/nested/inner.csv"), "inner")?;
    fs::write(out.join("other.csv"), "other")?;
    Ok(())
}

#[test]
fn abort_if_exist_fails_without_touching_existing_file() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let job = local_job(temp.path(), Mode::AbortIfExist)?;

    let result = run_job(&job, &[&["new\n"]]);
    let err = result.err();
    assert!(err.as_ref().is_some_and(OutputError::is_already_exists));
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "old");
    Ok(())
}

#[test]
fn abort_if_exist_writes_into_empty_target() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let job = local_job(temp.path(), Mode::AbortIfExist)?;

    let report = run_job(&job, &[&["a\n", "b\n"], &["c\n"]])?;
    assert_eq!(report.mode, Mode::AbortIfExist);
    assert_eq!(
        list_files(&temp.path().join("out"))?,
        vec!["data_000.00.csv", "data_001.00.csv"]
    );
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "a\nb\n");
    Ok(())
}

#[test]
fn overwrite_replaces_existing_content() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let job = local_job(temp.path(), Mode::Overwrite)?;

    run_job(&job, &[&["new\n"]])?;
    let out = temp.path().join("out");
    assert_eq!(read_text(&out, "data_000.00.csv")?, "new\n");
    assert_eq!(read_text(&out, "data_stale.csv")?, "stale");
    Ok(())
}

#[test]
fn delete_files_in_advance_keeps_directories() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let job = local_job(temp.path(), Mode::DeleteFilesInAdvance)?;

    run_job(&job, &[&["fresh\n"]])?;
    assert_eq!(
        list_files(&temp.path().join("out"))?,
        vec![
            "data_000.00.csv",
            "data_dir/nested/inner.csv",
            "other.csv"
        ]
    );
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "fresh\n");
    Ok(())
}

#[test]
fn delete_recursive_in_advance_removes_everything_matching() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let job = local_job(temp.path(), Mode::DeleteRecursiveInAdvance)?;

    run_job(&job, &[&["fresh\n"]])?;
    assert_eq!(
        list_files(&temp.path().join("out"))?,
        vec!["data_000.00.csv", "other.csv"]
    );
    assert!(!temp.path().join("out/data_dir").exists());
    Ok(())
}

#[test]
fn replace_twice_leaves_only_second_run() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let out = temp.path().join("out");

    let first = local_job(temp.path(), Mode::Replace)?;
    run_job(&first, &[&["first\n", "", "first-b\n"], &["first\n"]])?;
    assert_eq!(
        list_files(&out)?,
        vec!["data_000.00.csv", "data_000.01.csv", "data_001.00.csv"]
    );

    let second = local_job(temp.path(), Mode::Replace)?;
    let report = run_job(&second, &[&["second\n"]])?;
    assert_eq!(report.files.len(), 1);
    assert!(report.files[0].starts_with(temp.path().join("ws")));
    assert_eq!(list_files(&out)?, vec!["data_000.00.csv"]);
    assert_eq!(read_text(&out, "data_000.00.csv")?, "second\n");
    assert_eq!(child_count(&temp.path().join("ws"))?, 0);
    Ok(())
}

#[test]
fn replace_does_not_promote_when_a_task_fails() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let job = local_job(temp.path(), Mode::Replace)?;

    let result = job.transaction(|opener| {
        let mut writer = opener.open(0);
        writer.next_file()?;
        writer.write(b"partial\n")?;
        writer.abort();
        Err(OutputError::task_failed(0, std::io::Error::other("input failed")))
    });
    assert!(matches!(result, Err(OutputError::TaskFailed { task_index: 0, .. })));
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "old");
    assert_eq!(child_count(&temp.path().join("ws"))?, 1);
    Ok(())
}

#[test]
fn replace_rejects_separator_in_sequence_format() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let raw = serde_json::json!({
        "path_prefix": format!("{}/out/data_", temp.path().display()),
        "file_ext": "csv",
        "sequence_format": "%03d/%02d.",
        "mode": "replace",
    });
    let resolved = JobSpec::resolve(parse_output_config(&raw.to_string())?);
    assert!(resolved.is_err());
    assert!(!temp.path().join("out").exists());
    Ok(())
}

#[test]
fn empty_file_slots_leave_no_files() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let job = local_job(temp.path(), Mode::Overwrite)?;

    let report = run_job(&job, &[&[""], &["x\n"]])?;
    assert_eq!(report.files, vec![temp.path().join("out/data_001.00.csv")]);
    assert_eq!(list_files(&temp.path().join("out"))?, vec!["data_001.00.csv"]);
    Ok(())
}

#[test]
fn transient_failures_are_retried_then_succeed() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Create, 2);
    let context = context(Arc::new(flaky.clone()))?;
    let metrics = context.metrics().clone();
    let job = OutputJob::new(job_spec(temp.path(), Mode::AbortIfExist)?, context);

    let report = run_job(&job, &[&["row\n"]])?;
    assert_eq!(report.files.len(), 1);
    assert_eq!(flaky.calls(FsCall::Create), 3);
    assert_eq!(metrics.fs_retries("create"), 2);
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "row\n");
    Ok(())
}

#[test]
fn exhausted_retries_surface_the_last_failure() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Glob, 3);
    let job = OutputJob::new(
        job_spec(temp.path(), Mode::DeleteFilesInAdvance)?,
        context(Arc::new(flaky.clone()))?,
    );

    let result = run_job(&job, &[&["row\n"]]);
    assert!(matches!(
        result,
        Err(OutputError::Fs {
            source: FsError::Io { .. },
            ..
        })
    ));
    assert_eq!(flaky.calls(FsCall::Glob), 3);
    assert_eq!(flaky.calls(FsCall::Create), 0);
    Ok(())
}

#[test]
fn existence_conflicts_are_not_retried() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let flaky = FlakyFileSystem::local();
    let job = OutputJob::new(
        job_spec(temp.path(), Mode::AbortIfExist)?,
        context(Arc::new(flaky.clone()))?,
    );

    assert!(run_job(&job, &[&["row\n"]]).is_err());
    assert_eq!(flaky.calls(FsCall::Create), 1);
    Ok(())
}

#[test]
fn write_failures_are_retried() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Write, 1);
    let job = OutputJob::new(
        job_spec(temp.path(), Mode::Overwrite)?,
        context(Arc::new(flaky.clone()))?,
    );

    run_job(&job, &[&["row\n"]])?;
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "row\n");
    Ok(())
}

#[test]
fn replace_promotion_survives_transient_rename_failures() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Rename, 2);
    let context = context(Arc::new(flaky.clone()))?;
    let metrics = context.metrics().clone();
    let job = OutputJob::new(job_spec(temp.path(), Mode::Replace)?, context);

    run_job(&job, &[&["fresh\n"]])?;
    let out = temp.path().join("out");
    assert_eq!(list_files(&out)?, vec!["data_000.00.csv"]);
    assert_eq!(read_text(&out, "data_000.00.csv")?, "fresh\n");
    assert_eq!(flaky.calls(FsCall::Rename), 3);
    assert_eq!(metrics.fs_retries("rename"), 2);
    assert_eq!(child_count(&temp.path().join("ws"))?, 0);
    Ok(())
}

#[test]
fn pre_run_deletion_survives_a_transient_delete_failure() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Delete, 1);
    let job = OutputJob::new(
        job_spec(temp.path(), Mode::DeleteFilesInAdvance)?,
        context(Arc::new(flaky.clone()))?,
    );

    run_job(&job, &[&["fresh\n"]])?;
    let out = temp.path().join("out");
    assert!(!out.join("data_stale.csv").exists());
    assert_eq!(read_text(&out, "data_000.00.csv")?, "fresh\n");
    assert_eq!(flaky.calls(FsCall::Delete), 3);
    Ok(())
}

#[test]
fn staging_directory_failure_stops_the_job_before_any_writer() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    seed_existing(temp.path())?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Mkdirs, 3);
    let job = OutputJob::new(
        job_spec(temp.path(), Mode::Replace)?,
        context(Arc::new(flaky.clone()))?,
    );

    let mut opened = false;
    let result = job.transaction(|_| {
        opened = true;
        Ok(Vec::new())
    });
    assert!(matches!(
        result,
        Err(OutputError::Fs {
            source: FsError::Io { .. },
            ..
        })
    ));
    assert!(!opened);
    assert_eq!(flaky.calls(FsCall::Mkdirs), 3);
    assert_eq!(flaky.calls(FsCall::Create), 0);
    assert_eq!(flaky.calls(FsCall::Rename), 0);
    assert_eq!(read_text(&temp.path().join("out"), "data_000.00.csv")?, "old");
    Ok(())
}

#[test]
fn closing_the_filesystem_is_retried() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let flaky = FlakyFileSystem::local();
    flaky.fail_next(FsCall::Close, 1);
    let context = context(Arc::new(flaky.clone()))?;
    let metrics = context.metrics().clone();
    let job = OutputJob::new(job_spec(temp.path(), Mode::Overwrite)?, context);

    run_job(&job, &[&["row\n"]])?;
    assert_eq!(flaky.calls(FsCall::Close), 2);
    assert_eq!(metrics.fs_retries("close"), 1);
    assert_eq!(metrics.jobs("overwrite", "success"), 1);
    Ok(())
}
