//! Source providers: turn a locator into a directory on disk.
pub mod core_dir;
pub mod github;
pub mod http;
pub mod local;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ModError;

/// What to resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceRequest<'a> {
    /// Alias or module name, for errors and logs.
    pub name: &'a str,
    /// Provider-specific locator: path, `owner/repo`, or url.
    pub locator: &'a str,
    /// Requested version or ref.
    pub version: Option<&'a str>,
    /// Revision recorded in the lockfile; skips ref resolution.
    pub locked_rev: Option<&'a str>,
    /// Content hash recorded in the lockfile; fetched bytes must match.
    pub locked_hash: Option<&'a str>,
}

/// A source available on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Directory holding the source tree.
    pub root: PathBuf,
    /// Immutable revision, for providers that have one.
    pub rev: Option<String>,
    /// Content hash, for providers backed by the fetch cache.
    pub hash: Option<String>,
}

/// One kind of source.
pub trait SourceProvider: Send + Sync {
    /// Provider name as written before the `:` in source strings.
    fn id(&self) -> &str;

    /// Whether `@version` pins are meaningful.
    fn versioned(&self) -> bool {
        false
    }

    /// Whether resolutions are recorded in the lockfile.
    fn lockable(&self) -> bool {
        false
    }

    /// Make the source available locally.
    ///
    /// # Errors
    ///
    /// Returns [`ModError`] when the locator is invalid, the source does not
    /// exist, or a fetch fails.
    fn resolve(&self, request: &SourceRequest<'_>) -> Result<ResolvedSource, ModError>;
}

/// Providers by id.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SourceProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}

impl ProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its id, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn SourceProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Provider registered under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn SourceProvider>> {
        self.providers.get(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Canonicalize `path` and require it to be a directory.
pub(crate) fn existing_dir(path: PathBuf) -> Result<PathBuf, ModError> {
    match dunce::canonicalize(&path) {
        Ok(p) if p.is_dir() => Ok(p),
        _ => Err(ModError::NotFound { path }),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(local::LocalProvider));
        registry.register(Arc::new(core_dir::CoreProvider::new(dir.path())));
        assert_eq!(registry.ids(), vec!["core", "local"]);
        assert!(registry.get("local").is_some());
        assert!(registry.get("github").is_none());
    }

    #[test]
    fn existing_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "").unwrap();
        assert!(existing_dir(dir.path().to_path_buf()).is_ok());
        assert!(matches!(existing_dir(file), Err(ModError::NotFound { .. })));
    }
}
