//! `workspaced.sum.toml`: the lockfile.
//!
//! Records, per source alias, the normalized locator plus the resolved
//! revision and content hash, and per module the source string and version
//! that were resolved.  Normal runs only read it; `workspaced lock` writes it.
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::config::toml_loader::load_optional;
use crate::error::ModError;

/// File name of the lockfile inside the workspace root.
pub const SUMFILE_NAME: &str = "workspaced.sum.toml";

/// Parsed lockfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumFile {
    /// Locked source aliases by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, LockedSource>,
    /// Locked modules by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, LockedModule>,
}

/// Lock entry for a source alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedSource {
    /// Provider id (`local`, `github`, `https` ...).
    pub provider: String,
    /// Directory for `local` and `core` aliases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `owner/name` for `github` aliases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Tarball url for `http(s)` aliases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Ref as requested in the mod-file.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Resolved immutable revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Content hash of the fetched archive (`sha256:<hex>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl LockedSource {
    /// `provider:locator` as recorded, for comparison with the mod-file.
    #[must_use]
    pub fn source(&self) -> String {
        let locator = self
            .path
            .as_deref()
            .or(self.repo.as_deref())
            .or(self.url.as_deref())
            .unwrap_or_default();
        match self.provider.as_str() {
            "http" | "https" => locator.to_string(),
            _ => format!("{}:{locator}", self.provider),
        }
    }
}

/// Lock entry for a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedModule {
    /// Normalized source string, without version.
    pub source: String,
    /// Version as requested, or the resolved revision when none was.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Resolved immutable revision, for lockable providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Content hash of the fetched archive, for lockable providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl SumFile {
    /// Load the lockfile, or `None` if the workspace is not locked.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::Load`] if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Option<Self>, ModError> {
        load_optional(path).map_err(|e| ModError::Load {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })
    }

    /// Serialize with entries sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).context("serializing lockfile")?;
        Ok(format!(
            "# Generated by `workspaced lock`. Do not edit.\n\n{body}"
        ))
    }

    /// Write the lockfile atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.render()?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(text.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        tmp.persist(path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Whether nothing is locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.modules.is_empty()
    }
}
