//! `http:` / `https:` tarball sources.
use std::sync::Arc;

use super::{ResolvedSource, SourceProvider, SourceRequest};
use crate::error::{FetchError, ModError};
use crate::fetch::Fetcher;
use crate::modules::archive::unpack_tar_gz;
use crate::modules::cache::{CacheEntry, CacheMeta, SourceCache};

/// Fetch a `.tar.gz` from the first working url into the cache, unless the
/// cache already holds an entry for `provider` + `fetch_key`.
pub(crate) fn fetch_tarball(
    cache: &SourceCache,
    fetcher: &dyn Fetcher,
    provider: &str,
    fetch_key: &str,
    urls: &[String],
    expected: Option<&str>,
) -> Result<CacheEntry, FetchError> {
    let key = SourceCache::key(provider, fetch_key);
    cache.get_or_fill(&key, |tree| {
        let fetched = fetcher.fetch(urls, expected)?;
        let entries = unpack_tar_gz(fetched.bytes.as_slice(), tree)?;
        tracing::debug!(provider, fetch_key, entries, "extracted archive");
        Ok(CacheMeta {
            provider: provider.to_string(),
            key: fetch_key.to_string(),
            url: fetched.url,
            hash: fetched.hash,
        })
    })
}

/// Compare the hash of a (possibly cached) entry with the locked one.
pub(crate) fn check_locked_hash(
    name: &str,
    locked: Option<&str>,
    entry: &CacheEntry,
) -> Result<(), ModError> {
    match locked {
        Some(locked) if locked != entry.meta.hash => Err(ModError::LockMismatch {
            name: name.to_string(),
            locked: locked.to_string(),
            computed: entry.meta.hash.clone(),
        }),
        _ => Ok(()),
    }
}

/// Plain tarball urls.  Versions are rejected; the url is the identity.
pub struct HttpProvider {
    scheme: &'static str,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<SourceCache>,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("scheme", &self.scheme)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl HttpProvider {
    /// Provider for `scheme` urls.
    #[must_use]
    pub fn new(scheme: &'static str, fetcher: Arc<dyn Fetcher>, cache: Arc<SourceCache>) -> Self {
        Self {
            scheme,
            fetcher,
            cache,
        }
    }
}

impl SourceProvider for HttpProvider {
    fn id(&self) -> &str {
        self.scheme
    }

    fn lockable(&self) -> bool {
        true
    }

    fn resolve(&self, request: &SourceRequest<'_>) -> Result<ResolvedSource, ModError> {
        if request.version.is_some() {
            return Err(ModError::VersionNotSupported {
                provider: self.scheme.to_string(),
                spec: request.locator.to_string(),
            });
        }
        let url = request.locator.to_string();
        let entry = fetch_tarball(
            &self.cache,
            self.fetcher.as_ref(),
            self.scheme,
            &url,
            std::slice::from_ref(&url),
            request.locked_hash,
        )
        .map_err(|source| ModError::Fetch {
            name: request.name.to_string(),
            source,
        })?;
        check_locked_hash(request.name, request.locked_hash, &entry)?;
        Ok(ResolvedSource {
            root: entry.tree,
            rev: None,
            hash: Some(entry.meta.hash),
        })
    }
}
