//! Local-disk implementation of [`FileSystem`].
//!
//! # Design
//! - Uses plain `std::fs` calls; directory moves rename first and fall back to a
//!   recursive copy followed by best-effort removal of the source.
//! - Glob patterns match whole paths with `/` treated as a literal separator, so `*`
//!   never crosses directory boundaries.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::client::{FileStatus, FileSystem, OutputStream};
use crate::error::{FsError, FsResult};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Filesystem backend operating on the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Construct a local backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn create(&self, path: &Path, overwrite: bool) -> FsResult<OutputStream> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| FsError::io("create.parent", parent, source))?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        match options.open(path) {
            Ok(file) => Ok(Box::new(BufWriter::new(file))),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(FsError::AlreadyExists {
                path: path.to_path_buf(),
            }),
            Err(source) => Err(FsError::io("create", path, source)),
        }
    }

    fn delete(&self, path: &Path, recursive: bool) -> FsResult<bool> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(FsError::io("delete.stat", path, source)),
        };

        let result = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(path)
            } else {
                fs::remove_dir(path)
            }
        } else {
            fs::remove_file(path)
        };
        result.map_err(|source| FsError::io("delete", path, source))?;
        Ok(true)
    }

    fn glob(&self, pattern: &Path) -> FsResult<Vec<FileStatus>> {
        let (base, depth) = split_literal_base(pattern);
        if depth == 0 {
            return Ok(fs::symlink_metadata(pattern)
                .ok()
                .map(|metadata| FileStatus {
                    path: pattern.to_path_buf(),
                    is_directory: metadata.is_dir(),
                })
                .into_iter()
                .collect());
        }

        let rendered = pattern.to_string_lossy();
        let matcher = GlobBuilder::new(&rendered)
            .literal_separator(true)
            .build()
            .map_err(|source| FsError::Glob {
                pattern: rendered.to_string(),
                source,
            })?
            .compile_matcher();

        let bare = base.as_os_str().is_empty();
        let root = if bare {
            Path::new(".")
        } else {
            base.as_path()
        };
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(depth)
            .max_depth(depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| FsError::walkdir("glob", root, source))?;
            // A bare pattern is matched against `name`, not `./name`.
            let candidate = if bare {
                entry.path().strip_prefix(root).unwrap_or_else(|_| entry.path())
            } else {
                entry.path()
            };
            if matcher.is_match(candidate) {
                matches.push(FileStatus {
                    path: candidate.to_path_buf(),
                    is_directory: entry.file_type().is_dir(),
                });
            }
        }
        debug!(pattern = %rendered, matched = matches.len(), "glob evaluated");
        Ok(matches)
    }

    fn mkdirs(&self, path: &Path) -> FsResult<bool> {
        fs::create_dir_all(path).map_err(|source| FsError::io("mkdirs", path, source))?;
        Ok(true)
    }

    fn rename_or_copy_directory(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
    ) -> FsResult<bool> {
        let source_meta = fs::symlink_metadata(src)
            .map_err(|source| FsError::io("rename.stat_source", src, source))?;

        if fs::symlink_metadata(dst).is_ok() {
            if !overwrite {
                return Err(FsError::AlreadyExists {
                    path: dst.to_path_buf(),
                });
            }
            remove_entry(dst).map_err(|source| FsError::io("rename.clear_destination", dst, source))?;
        }

        if let Some(parent) = dst.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| FsError::io("rename.parent", parent, source))?;
        }

        match fs::rename(src, dst) {
            Ok(()) => Ok(true),
            Err(err) => {
                debug!(
                    src = %src.display(),
                    dst = %dst.display(),
                    error = %err,
                    "rename failed; falling back to copy"
                );
                move_by_copy(src, dst, source_meta.is_dir(), remove_entry)?;
                Ok(true)
            }
        }
    }

    fn close(&self) -> FsResult<()> {
        Ok(())
    }
}

fn split_literal_base(pattern: &Path) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut depth = 0;
    for component in pattern.components() {
        let has_meta = matches!(component, Component::Normal(part)
            if part.to_string_lossy().contains(GLOB_META));
        if depth > 0 || has_meta {
            depth += 1;
        } else {
            base.push(component.as_os_str());
        }
    }
    (base, depth)
}

/// Copy `src` to `dst`, then drop `src`.
///
/// Once the copy is complete `dst` is authoritative: a failure to remove `src` is
/// logged and never reported, so a retried move cannot clear the full copy and
/// replace it with a partially removed source.
fn move_by_copy(
    src: &Path,
    dst: &Path,
    is_dir: bool,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> FsResult<()> {
    if is_dir {
        copy_tree(src, dst)?;
    } else {
        fs::copy(src, dst).map_err(|source| FsError::io("rename.copy", dst, source))?;
    }
    if let Err(err) = remove(src) {
        warn!(
            src = %src.display(),
            dst = %dst.display(),
            error = %err,
            "copied source could not be removed"
        );
    }
    Ok(())
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_tree(source: &Path, destination: &Path) -> FsResult<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|source_err| FsError::walkdir("copy_tree", source, source_err))?;
        let relative = entry.path().strip_prefix(source).map_err(|_| FsError::Unsupported {
            operation: "copy_tree",
            value: entry.path().display().to_string(),
        })?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|source_err| FsError::io("copy_tree.mkdir", &target, source_err))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|source_err| FsError::io("copy_tree.parent", parent, source_err))?;
            }
            let mut reader = File::open(entry.path())
                .map_err(|source_err| FsError::io("copy_tree.open", entry.path(), source_err))?;
            let mut writer = File::create(&target)
                .map_err(|source_err| FsError::io("copy_tree.create", &target, source_err))?;
            io::copy(&mut reader, &mut writer)
                .map_err(|source_err| FsError::io("copy_tree.copy", &target, source_err))?;
        }
    }
    Ok(())
}
