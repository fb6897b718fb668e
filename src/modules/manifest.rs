//! Optional `module.toml` inside a module directory.
//!
//! ```toml
//! target = "~/.config/nvim"
//!
//! [bins]
//! vi = ["nvim"]
//! ```
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::toml_loader::load_config;
use crate::error::ModError;

/// Manifest file name; never emitted as a desired file.
pub const MANIFEST_NAME: &str = "module.toml";

/// Optional `module.toml` at the root of a module.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Default target directory for the module's files.
    #[serde(default)]
    pub target: Option<String>,
    /// Command name to argv for generated launcher shims.
    #[serde(default)]
    pub bins: BTreeMap<String, Vec<String>>,
}

impl ModuleManifest {
    /// Load the manifest of the module rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::Load`] if the manifest exists but is invalid.
    pub fn load(dir: &Path) -> Result<Self, ModError> {
        let path = dir.join(MANIFEST_NAME);
        load_config(&path).map_err(|e| ModError::Load {
            path,
            message: format!("{e:#}"),
        })
    }
}
