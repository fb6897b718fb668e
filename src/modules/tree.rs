//! Listing the files of a source tree.
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ModError;
use crate::source::file_mode;

/// One file found in a resolved source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Path relative to the tree root.
    pub rel_path: PathBuf,
    /// Absolute path of the file inside the tree.
    pub source_path: PathBuf,
    /// Permission bits of the source file.
    pub mode: u32,
    /// Destination of a symlink, `None` for regular files.
    pub link_target: Option<PathBuf>,
}

/// Walk `root` and return every regular file and symlink, sorted by path.
///
/// Directories named in `skip_dirs` are pruned; files whose relative path
/// equals one of `skip_files` are left out.  Symlinks are reported, never
/// followed.
///
/// # Errors
///
/// Returns [`ModError::NotFound`] if `root` is not a directory, or
/// [`ModError::Load`] if an entry cannot be read.
pub fn list_files(
    root: &Path,
    skip_dirs: &[&str],
    skip_files: &[&str],
) -> Result<Vec<ResolvedFile>, ModError> {
    if !root.is_dir() {
        return Err(ModError::NotFound {
            path: root.to_path_buf(),
        });
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !skip_dirs.iter().any(|d| e.file_name() == *d)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| ModError::Load {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ModError::Load {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?
            .to_path_buf();
        if skip_files.iter().any(|f| rel_path == Path::new(f)) {
            continue;
        }

        let load_err = |e: std::io::Error| ModError::Load {
            path: entry.path().to_path_buf(),
            message: e.to_string(),
        };
        if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path()).map_err(load_err)?;
            files.push(ResolvedFile {
                rel_path,
                source_path: entry.path().to_path_buf(),
                mode: 0o777,
                link_target: Some(target),
            });
        } else if file_type.is_file() {
            let meta = entry.metadata().map_err(|e| ModError::Load {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;
            files.push(ResolvedFile {
                rel_path,
                source_path: entry.path().to_path_buf(),
                mode: file_mode(&meta),
                link_target: None,
            });
        }
    }
    Ok(files)
}
