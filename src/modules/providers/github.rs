//! `github:<owner>/<repo>[@ref]`: repository tarballs pinned to a commit.
//!
//! A ref (branch, tag, `HEAD`) is resolved to a commit SHA by listing the
//! remote's references.  The tarball for that SHA is fetched through the
//! source cache, so each commit is downloaded at most once.
use std::sync::Arc;

use super::http::{check_locked_hash, fetch_tarball};
use super::{ResolvedSource, SourceProvider, SourceRequest};
use crate::error::{FetchError, ModError};
use crate::fetch::Fetcher;
use crate::modules::cache::SourceCache;
use crate::modules::source_spec::split_github;

/// Resolves a ref of a GitHub repository to a commit SHA.
#[cfg_attr(test, mockall::automock)]
pub trait RefLookup: Send + Sync {
    /// Resolve `reference` (`HEAD`, a branch, or a tag) in `repo`
    /// (`owner/name`).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RefNotFound`] or [`FetchError::Git`].
    fn resolve_ref(&self, repo: &str, reference: &str) -> Result<String, FetchError>;
}

/// Whether `s` is a full 40-character hex commit id.
#[must_use]
pub fn is_commit(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Pick the commit for `reference` from `(ref name, sha)` pairs.
///
/// Lookup order: exact ref name, peeled tag, tag, branch.
#[must_use]
pub fn pick_ref(heads: &[(String, String)], reference: &str) -> Option<String> {
    let candidates = [
        reference.to_string(),
        format!("refs/tags/{reference}^{{}}"),
        format!("refs/tags/{reference}"),
        format!("refs/heads/{reference}"),
    ];
    candidates.iter().find_map(|want| {
        heads
            .iter()
            .find(|(name, _)| name == want)
            .map(|(_, sha)| sha.clone())
    })
}

/// Lists remote references over the git protocol (`git ls-remote`).
#[derive(Debug, Clone)]
pub struct GitRefLookup {
    base_url: String,
}

impl Default for GitRefLookup {
    fn default() -> Self {
        Self {
            base_url: "https://github.com".to_string(),
        }
    }
}

impl RefLookup for GitRefLookup {
    fn resolve_ref(&self, repo: &str, reference: &str) -> Result<String, FetchError> {
        let git_err = |source| FetchError::Git {
            repo: repo.to_string(),
            source,
        };
        let url = format!("{}/{repo}.git", self.base_url);
        tracing::debug!(url = %url, reference, "listing remote refs");
        let mut remote = git2::Remote::create_detached(url.as_str()).map_err(git_err)?;
        remote.connect(git2::Direction::Fetch).map_err(git_err)?;
        let heads: Vec<(String, String)> = remote
            .list()
            .map_err(git_err)?
            .iter()
            .map(|h| (h.name().to_string(), h.oid().to_string()))
            .collect();
        pick_ref(&heads, reference).ok_or_else(|| FetchError::RefNotFound {
            repo: repo.to_string(),
            reference: reference.to_string(),
        })
    }
}

/// Tarball download urls for a commit, in preference order.
#[must_use]
pub fn tarball_urls(repo: &str, rev: &str) -> Vec<String> {
    vec![
        format!("https://codeload.github.com/{repo}/tar.gz/{rev}"),
        format!("https://github.com/{repo}/archive/{rev}.tar.gz"),
    ]
}

/// `github:owner/repo[/subdir][@ref]`: tarballs of an immutable commit,
/// extracted into the shared cache.
pub struct GithubProvider {
    fetcher: Arc<dyn Fetcher>,
    refs: Arc<dyn RefLookup>,
    cache: Arc<SourceCache>,
}

impl std::fmt::Debug for GithubProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubProvider")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl GithubProvider {
    /// Provider fetching through `fetcher`, resolving refs with `refs`, and
    /// storing trees in `cache`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, refs: Arc<dyn RefLookup>, cache: Arc<SourceCache>) -> Self {
        Self {
            fetcher,
            refs,
            cache,
        }
    }
}

impl SourceProvider for GithubProvider {
    fn id(&self) -> &str {
        "github"
    }

    fn versioned(&self) -> bool {
        true
    }

    fn lockable(&self) -> bool {
        true
    }

    fn resolve(&self, request: &SourceRequest<'_>) -> Result<ResolvedSource, ModError> {
        let fetch_err = |source| ModError::Fetch {
            name: request.name.to_string(),
            source,
        };
        let (repo, _) = split_github(request.locator)?;
        let rev = match (request.locked_rev, request.version) {
            (Some(rev), _) => rev.to_string(),
            (None, Some(v)) if is_commit(v) => v.to_ascii_lowercase(),
            (None, v) => self
                .refs
                .resolve_ref(&repo, v.unwrap_or("HEAD"))
                .map_err(fetch_err)?,
        };
        tracing::debug!(repo = %repo, rev = %rev, "resolved github source");

        let entry = fetch_tarball(
            &self.cache,
            self.fetcher.as_ref(),
            "github",
            &format!("{repo}@{rev}"),
            &tarball_urls(&repo, &rev),
            request.locked_hash,
        )
        .map_err(fetch_err)?;
        check_locked_hash(request.name, request.locked_hash, &entry)?;

        Ok(ResolvedSource {
            root: entry.tree,
            rev: Some(rev),
            hash: Some(entry.meta.hash),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::modules::providers::http::tests::StaticFetcher;
    use mockall::predicate::eq;
    use std::sync::atomic::Ordering;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn heads() -> Vec<(String, String)> {
        vec![
            ("HEAD".to_string(), "h".repeat(40)),
            ("refs/heads/main".to_string(), "a".repeat(40)),
            ("refs/tags/v1".to_string(), "b".repeat(40)),
            ("refs/tags/v1^{}".to_string(), "c".repeat(40)),
            ("refs/heads/v2".to_string(), "d".repeat(40)),
        ]
    }

    #[test]
    fn picks_refs_in_order() {
        assert_eq!(pick_ref(&heads(), "HEAD"), Some("h".repeat(40)));
        assert_eq!(pick_ref(&heads(), "main"), Some("a".repeat(40)));
        assert_eq!(pick_ref(&heads(), "v1"), Some("c".repeat(40)));
        assert_eq!(pick_ref(&heads(), "v2"), Some("d".repeat(40)));
        assert_eq!(pick_ref(&heads(), "nope"), None);
    }

    #[test]
    fn commit_detection() {
        assert!(is_commit(SHA));
        assert!(!is_commit("main"));
        assert!(!is_commit(&"g".repeat(40)));
    }

    #[test]
    fn tarball_url_order() {
        let urls = tarball_urls("me/dots", SHA);
        assert_eq!(urls[0], format!("https://codeload.github.com/me/dots/tar.gz/{SHA}"));
        assert_eq!(urls[1], format!("https://github.com/me/dots/archive/{SHA}.tar.gz"));
    }

    fn provider(
        refs: MockRefLookup,
        fetcher: Arc<StaticFetcher>,
        cache: &std::path::Path,
    ) -> GithubProvider {
        GithubProvider::new(fetcher, Arc::new(refs), Arc::new(SourceCache::new(cache)))
    }

    #[test]
    fn resolves_branch_through_ref_lookup() {
        let cache = tempfile::tempdir().unwrap();
        let mut refs = MockRefLookup::new();
        refs.expect_resolve_ref()
            .with(eq("me/dots"), eq("main"))
            .times(1)
            .returning(|_, _| Ok(SHA.to_string()));
        let fetcher = Arc::new(StaticFetcher::new(&[("nvim/init.lua", "x")]));
        let p = provider(refs, Arc::clone(&fetcher), cache.path());

        let resolved = p
            .resolve(&SourceRequest {
                name: "dots",
                locator: "me/dots",
                version: Some("main"),
                ..SourceRequest::default()
            })
            .unwrap();
        assert_eq!(resolved.rev.as_deref(), Some(SHA));
        assert!(resolved.root.join("nvim/init.lua").is_file());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn commit_version_skips_ref_lookup() {
        let cache = tempfile::tempdir().unwrap();
        let mut refs = MockRefLookup::new();
        refs.expect_resolve_ref().never();
        let p = provider(refs, Arc::new(StaticFetcher::new(&[("f", "x")])), cache.path());
        let resolved = p
            .resolve(&SourceRequest {
                name: "dots",
                locator: "me/dots",
                version: Some(SHA),
                ..SourceRequest::default()
            })
            .unwrap();
        assert_eq!(resolved.rev.as_deref(), Some(SHA));
    }

    #[test]
    fn locked_rev_wins_over_branch() {
        let cache = tempfile::tempdir().unwrap();
        let mut refs = MockRefLookup::new();
        refs.expect_resolve_ref().never();
        let p = provider(refs, Arc::new(StaticFetcher::new(&[("f", "x")])), cache.path());
        let resolved = p
            .resolve(&SourceRequest {
                name: "dots",
                locator: "me/dots",
                version: Some("main"),
                locked_rev: Some(SHA),
                ..SourceRequest::default()
            })
            .unwrap();
        assert_eq!(resolved.rev.as_deref(), Some(SHA));
    }

    #[test]
    fn unknown_ref_is_fetch_error() {
        let cache = tempfile::tempdir().unwrap();
        let mut refs = MockRefLookup::new();
        refs.expect_resolve_ref().returning(|repo, reference| {
            Err(FetchError::RefNotFound {
                repo: repo.to_string(),
                reference: reference.to_string(),
            })
        });
        let p = provider(refs, Arc::new(StaticFetcher::new(&[])), cache.path());
        let err = p
            .resolve(&SourceRequest {
                name: "dots",
                locator: "me/dots",
                version: Some("nope"),
                ..SourceRequest::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ModError::Fetch {
                source: FetchError::RefNotFound { .. },
                ..
            }
        ));
    }
}
