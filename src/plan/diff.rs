//! Comparing one desired file with the live filesystem.
use std::fs::Metadata;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::Action;
use crate::error::PlanError;
use crate::source::{DesiredFile, FileKind, is_bundle};
use crate::state::ManagedEntry;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PlanError + '_ {
    move |source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// SHA-256 of everything `reader` yields.
///
/// # Errors
///
/// Returns the first read error.
pub fn hash_reader(mut reader: impl io::Read) -> io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

#[cfg(unix)]
fn mode_matches(meta: &Metadata, mode: u32) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777 == mode & 0o7777
}

#[cfg(not(unix))]
fn mode_matches(_meta: &Metadata, _mode: u32) -> bool {
    true
}

/// Whether the live target already has the desired type and content.
fn live_matches(file: &DesiredFile, target: &Path, meta: &Metadata) -> Result<bool, PlanError> {
    match file.kind() {
        FileKind::Symlink => {
            if !meta.file_type().is_symlink() {
                return Ok(false);
            }
            let live = std::fs::read_link(target).map_err(io_err(target))?;
            Ok(file.link_target() == Some(live.as_path()))
        }
        FileKind::Regular => {
            if !meta.is_file() || !mode_matches(meta, file.mode()) {
                return Ok(false);
            }
            let desired = hash_reader(file.open().map_err(io_err(target))?)
                .map_err(io_err(target))?;
            let live = hash_reader(std::fs::File::open(target).map_err(io_err(target))?)
                .map_err(io_err(target))?;
            Ok(desired == live)
        }
    }
}

/// Decide the action for one desired file.
///
/// # Errors
///
/// Returns [`PlanError::Io`] if the target exists but cannot be inspected,
/// or the desired content cannot be read.
pub fn compare(file: &DesiredFile, managed: Option<&ManagedEntry>) -> Result<Action, PlanError> {
    let target = file.target_path();
    let meta = match std::fs::symlink_metadata(&target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Action::Create {
                target,
                desired: file.clone(),
            });
        }
        Err(e) => return Err(io_err(&target)(e)),
    };

    let same_provenance = managed.is_some_and(|m| m.source_info == file.source_info());
    if same_provenance && is_bundle(file.source_info()) {
        return Ok(Action::Noop { target });
    }

    if !live_matches(file, &target, &meta)? || !same_provenance {
        return Ok(Action::Update {
            target,
            desired: file.clone(),
            prior: managed.cloned(),
        });
    }
    Ok(Action::Noop { target })
}
