//! Filesystem primitives used by the executor.
use std::io;
use std::path::Path;

use anyhow::{Context as _, Result, bail};

use crate::source::{DesiredFile, FileKind};

/// Create the parent directory of `path` and any missing ancestors.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Refuse to replace a real directory with a file or link.
fn reject_directory(target: &Path) -> Result<()> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => bail!("{} is a directory", target.display()),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn set_mode(file: &std::fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &std::fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Write `file` to `target` through a sibling temp file and rename.
///
/// An existing file or symlink at `target` is replaced atomically.
///
/// # Errors
///
/// Returns an error if `target` is a directory, the content cannot be read,
/// or the temp file cannot be written or renamed.
pub fn write_regular(target: &Path, file: &DesiredFile) -> Result<()> {
    ensure_parent_dir(target)?;
    reject_directory(target)?;
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".workspaced-")
        .tempfile_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    let mut content = file
        .open()
        .with_context(|| format!("read content for {}", target.display()))?;
    io::copy(&mut content, tmp.as_file_mut())
        .with_context(|| format!("write {}", tmp.path().display()))?;
    set_mode(tmp.as_file(), file.mode())
        .with_context(|| format!("set mode {:o} on {}", file.mode(), target.display()))?;
    tmp.persist(target)
        .with_context(|| format!("rename into {}", target.display()))?;
    Ok(())
}

/// Point `target` at `link`, replacing whatever file or link is there.
///
/// # Errors
///
/// Returns an error if `target` is a directory or the link cannot be made.
pub fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    ensure_parent_dir(target)?;
    reject_directory(target)?;
    if target.symlink_metadata().is_ok() {
        std::fs::remove_file(target)
            .with_context(|| format!("remove existing: {}", target.display()))?;
    }
    create_symlink(link, target)
        .with_context(|| format!("create link: {} -> {}", target.display(), link.display()))
}

#[cfg(unix)]
fn create_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn create_symlink(link: &Path, target: &Path) -> io::Result<()> {
    if link.is_dir() {
        std::os::windows::fs::symlink_dir(link, target)
    } else {
        std::os::windows::fs::symlink_file(link, target)
    }
}

/// Write one desired file, dispatching on its kind.
///
/// # Errors
///
/// See [`write_regular`] and [`write_symlink`].
pub fn write_desired(target: &Path, file: &DesiredFile) -> Result<()> {
    match (file.kind(), file.link_target()) {
        (FileKind::Symlink, Some(link)) => write_symlink(target, link),
        _ => write_regular(target, file),
    }
}

/// What [`remove_managed`] found at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The managed file or link was removed.
    Removed,
    /// Nothing there any more.
    Missing,
    /// Something of a different type replaced the managed file; left alone.
    TypeChanged,
}

/// Remove `target` if its live type still matches `kind`.
///
/// # Errors
///
/// Returns an error if the target cannot be inspected or removed.
pub fn remove_managed(target: &Path, kind: FileKind) -> Result<Removal> {
    let meta = match std::fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::Missing),
        Err(e) => return Err(e).with_context(|| format!("inspect {}", target.display())),
    };
    let matches = match kind {
        FileKind::Regular => meta.is_file(),
        FileKind::Symlink => meta.file_type().is_symlink(),
    };
    if !matches {
        return Ok(Removal::TypeChanged);
    }
    std::fs::remove_file(target).with_context(|| format!("remove {}", target.display()))?;
    Ok(Removal::Removed)
}
