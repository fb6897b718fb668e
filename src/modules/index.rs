//! Registry index for `registry:<name>[@version]` module sources.
//!
//! The index is a TOML file named by `[registry] index` in the mod-file:
//!
//! ```toml
//! [modules.nvim]
//! source = "github:someone/nvim-config@v2"
//! ```
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::source_spec::SourceSpec;
use crate::config::toml_loader::load_required;
use crate::error::ModError;

/// Registry index: module name to source string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    modules: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexEntry {
    source: String,
}

impl RegistryIndex {
    /// Load the index at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::Load`] if the file is missing or invalid.
    pub fn load(path: &Path) -> Result<Self, ModError> {
        load_required(path).map_err(|e| ModError::Load {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })
    }

    /// Resolve `name` to the source it is published under.
    ///
    /// A version on the request overrides the version in the index.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::InvalidSpec`] when the name is not indexed or the
    /// indexed source points back into the registry.
    pub fn lookup(&self, name: &str, version: Option<&str>) -> Result<SourceSpec, ModError> {
        let request = format!("registry:{name}");
        let entry = self.modules.get(name).ok_or_else(|| ModError::InvalidSpec {
            spec: request.clone(),
            reason: "not present in the registry index".to_string(),
        })?;
        let mut spec = SourceSpec::parse(&entry.source)?;
        if spec.provider == "registry" {
            return Err(ModError::InvalidSpec {
                spec: request,
                reason: format!("index entry '{}' points back into the registry", entry.source),
            });
        }
        if let Some(v) = version {
            spec.version = Some(v.to_string());
        }
        Ok(spec)
    }
}
