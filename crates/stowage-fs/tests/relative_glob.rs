//! Runs alone in its own binary because it changes the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use stowage_fs::{FileStatus, FileSystem, LocalFileSystem};

type TestResult<T> = anyhow::Result<T>;

#[test]
fn bare_patterns_match_entries_in_the_working_directory() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    fs::write(temp.path().join("data_000.00.csv"), b"a")?;
    fs::create_dir_all(temp.path().join("data_dir"))?;
    fs::write(temp.path().join("other.csv"), b"b")?;
    std::env::set_current_dir(temp.path())?;

    let fs_client = LocalFileSystem::new();
    assert_eq!(
        fs_client.glob(Path::new("data_*"))?,
        vec![
            FileStatus::file(PathBuf::from("data_000.00.csv")),
            FileStatus::directory(PathBuf::from("data_dir")),
        ]
    );
    assert_eq!(fs_client.glob(&temp.path().join("data_*"))?.len(), 2);
    Ok(())
}
