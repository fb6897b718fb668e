//! `local:<path>`: a directory on this machine.
use std::path::PathBuf;

use super::{ResolvedSource, SourceProvider, SourceRequest, existing_dir};
use crate::error::ModError;

/// Resolves locators as filesystem paths.  Relative paths are made absolute
/// by the resolver before they reach the provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProvider;

impl SourceProvider for LocalProvider {
    fn id(&self) -> &str {
        "local"
    }

    fn resolve(&self, request: &SourceRequest<'_>) -> Result<ResolvedSource, ModError> {
        Ok(ResolvedSource {
            root: existing_dir(PathBuf::from(request.locator))?,
            rev: None,
            hash: None,
        })
    }
}
