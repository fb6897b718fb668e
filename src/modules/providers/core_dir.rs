//! `core:<name>`: modules shipped inside the workspace's core directory.
use std::path::{Component, Path, PathBuf};

use super::{ResolvedSource, SourceProvider, SourceRequest, existing_dir};
use crate::error::ModError;

/// `core:<name>`: a module bundled in the core modules directory.
#[derive(Debug, Clone)]
pub struct CoreProvider {
    root: PathBuf,
}

impl CoreProvider {
    /// Provider serving modules under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceProvider for CoreProvider {
    fn id(&self) -> &str {
        "core"
    }

    fn resolve(&self, request: &SourceRequest<'_>) -> Result<ResolvedSource, ModError> {
        let name = Path::new(request.locator);
        if !name.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(ModError::InvalidSpec {
                spec: format!("core:{}", request.locator),
                reason: "core module names must be relative paths".to_string(),
            });
        }
        Ok(ResolvedSource {
            root: existing_dir(self.root.join(name))?,
            rev: None,
            hash: None,
        })
    }
}
