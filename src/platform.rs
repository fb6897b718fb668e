//! Platform paths: home directory, XDG base directories, and `~` expansion.
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Return the user's home directory.
///
/// # Errors
///
/// Returns an error if neither `HOME` nor `USERPROFILE` is set.
pub fn home_dir() -> Result<PathBuf> {
    let home = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE")
            .or_else(|_| std::env::var("HOME"))
            .map_err(|_| {
                anyhow::anyhow!("neither USERPROFILE nor HOME environment variable is set")
            })?
    } else {
        std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable is not set"))?
    };
    Ok(PathBuf::from(home))
}

/// Resolve an XDG base directory, falling back to `$HOME/<fallback>`.
fn xdg_dir(var: &str, fallback: &str) -> Result<PathBuf> {
    match std::env::var(var) {
        Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(home_dir()?.join(fallback)),
    }
}

/// `$XDG_CACHE_HOME/workspaced` (default `~/.cache/workspaced`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn cache_dir() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_CACHE_HOME", ".cache")?.join("workspaced"))
}

/// `$XDG_STATE_HOME/workspaced` (default `~/.local/state/workspaced`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn state_dir() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_STATE_HOME", ".local/state")?.join("workspaced"))
}

/// Expand a leading `~` and make relative paths absolute against `base`.
///
/// # Errors
///
/// Returns an error if `raw` starts with `~` and the home directory cannot
/// be determined.
pub fn expand_path(raw: &str, base: &Path) -> Result<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(base.join(path))
    }
}
