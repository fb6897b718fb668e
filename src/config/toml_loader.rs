//! TOML file loading shared by the workspace config, mod-file, sum-file,
//! registry index and module manifests.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a TOML file, treating a missing file as empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        // Missing files deserialize like an empty document.
        return toml::from_str("").context("Failed to create empty config");
    }
    load_required(path)
}

/// Load a TOML file that must exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_required<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Load a TOML file, returning `None` when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    load_required(path).map(Some)
}
