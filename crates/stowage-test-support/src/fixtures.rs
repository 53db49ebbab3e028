//! Directory snapshot helpers.

use std::fs;
use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;

/// Relative paths of every regular file under `root`, sorted; empty when `root` is
/// missing.
///
/// # Errors
///
/// Returns an error when the tree cannot be traversed.
pub fn list_files(root: &Path) -> anyhow::Result<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root)?;
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(files)
}

/// Contents of the file at `root/relative` as UTF-8.
///
/// # Errors
///
/// Returns an error when the file cannot be read.
pub fn read_text(root: &Path, relative: &str) -> anyhow::Result<String> {
    let path = root.join(relative);
    fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
}

/// Number of direct children of `dir`; zero when `dir` is missing.
///
/// # Errors
///
/// Returns an error when `dir` exists but cannot be listed.
pub fn child_count(dir: &Path) -> anyhow::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    Ok(fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_files_returns_sorted_relative_paths() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        fs::create_dir_all(temp.path().join("b"))?;
        fs::write(temp.path().join("b/two.csv"), "2")?;
        fs::write(temp.path().join("a.csv"), "1")?;

        assert_eq!(list_files(temp.path())?, vec!["a.csv", "b/two.csv"]);
        assert_eq!(read_text(temp.path(), "b/two.csv")?, "2");
        assert_eq!(child_count(temp.path())?, 2);
        assert!(list_files(&temp.path().join("missing"))?.is_empty());
        Ok(())
    }
}
