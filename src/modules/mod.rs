//! Module sources: grammar, providers, the fetch cache, and the lockfile.
pub mod archive;
pub mod cache;
pub mod index;
pub mod manifest;
pub mod modfile;
pub mod providers;
pub mod resolver;
pub mod source_spec;
pub mod sumfile;
pub mod tree;

use std::path::PathBuf;
use std::sync::Arc;

use crate::fetch::Fetcher;
use cache::SourceCache;
use providers::ProviderRegistry;
use providers::core_dir::CoreProvider;
use providers::github::{GithubProvider, RefLookup};
use providers::http::HttpProvider;
use providers::local::LocalProvider;

/// Everything the built-in providers need.
pub struct ProviderDeps {
    /// Directory holding `core:` modules.
    pub core_root: PathBuf,
    /// Root of the fetch cache.
    pub cache_root: PathBuf,
    /// Downloads archives for `github` and `http(s)`.
    pub fetcher: Arc<dyn Fetcher>,
    /// Turns GitHub refs into commits.
    pub refs: Arc<dyn RefLookup>,
}

impl std::fmt::Debug for ProviderDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDeps")
            .field("core_root", &self.core_root)
            .field("cache_root", &self.cache_root)
            .finish_non_exhaustive()
    }
}

/// Registry with `local`, `core`, `github`, `http` and `https`.
///
/// The remote providers share one cache, so concurrent requests for the
/// same archive are fetched once.
#[must_use]
pub fn default_providers(deps: ProviderDeps) -> ProviderRegistry {
    let cache = Arc::new(SourceCache::new(deps.cache_root));
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(LocalProvider));
    registry.register(Arc::new(CoreProvider::new(deps.core_root)));
    registry.register(Arc::new(GithubProvider::new(
        Arc::clone(&deps.fetcher),
        deps.refs,
        Arc::clone(&cache),
    )));
    for scheme in ["http", "https"] {
        registry.register(Arc::new(HttpProvider::new(
            scheme,
            Arc::clone(&deps.fetcher),
            Arc::clone(&cache),
        )));
    }
    registry
}
