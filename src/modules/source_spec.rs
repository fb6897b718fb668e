//! The `provider:ref[@version]` source grammar.
use std::fmt;

use crate::error::ModError;

/// Providers recognized without a mod-file alias.
pub const BUILTIN_PROVIDERS: &[&str] = &["local", "core", "github", "registry", "http", "https"];

/// Whether `provider` is built in (as opposed to a mod-file alias).
#[must_use]
pub fn is_builtin(provider: &str) -> bool {
    BUILTIN_PROVIDERS.contains(&provider)
}

/// A parsed source string.
///
/// The version suffix is only recognized after the last `/`, so
/// `github:owner/repo@v1` pins `v1` while `local:some@dir/file` does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Provider id or alias, before the `:`.
    pub provider: String,
    /// Provider-specific reference, after the `:`.
    pub target: String,
    /// Version after a trailing `@`, if any.
    pub version: Option<String>,
}

impl SourceSpec {
    /// Parse `provider:ref[@version]`.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::InvalidSpec`] when the provider or reference is
    /// missing, the provider contains invalid characters, or the version
    /// after `@` is empty.
    pub fn parse(spec: &str) -> Result<Self, ModError> {
        let invalid = |reason: &str| ModError::InvalidSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let spec_trimmed = spec.trim();
        let Some((provider, rest)) = spec_trimmed.split_once(':') else {
            return Err(invalid("expected provider:ref"));
        };
        if provider.is_empty() {
            return Err(invalid("missing provider"));
        }
        if !provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("provider may only contain letters, digits, '-' and '_'"));
        }

        let (target, version) = match rest.rsplit_once('@') {
            Some((target, version)) if !version.contains('/') => (target, Some(version)),
            _ => (rest, None),
        };
        if target.is_empty() {
            return Err(invalid("missing reference"));
        }
        if version.is_some_and(str::is_empty) {
            return Err(invalid("empty version after '@'"));
        }

        Ok(Self {
            provider: provider.to_string(),
            target: target.to_string(),
            version: version.map(ToString::to_string),
        })
    }

    /// `provider:target` without the version.
    #[must_use]
    pub fn source(&self) -> String {
        format!("{}:{}", self.provider, self.target)
    }

    /// Whether the provider is built in.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        is_builtin(&self.provider)
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.target)?;
        if let Some(v) = &self.version {
            write!(f, "@{v}")?;
        }
        Ok(())
    }
}

/// Normalize a GitHub locator into `(owner/repo, subdir)`.
///
/// Accepts `owner/repo`, `owner/repo/sub/dir`, a trailing `.git` on the
/// repository and surrounding slashes.
///
/// # Errors
///
/// Returns [`ModError::InvalidSpec`] when owner or repository is missing.
pub fn split_github(target: &str) -> Result<(String, Option<String>), ModError> {
    let trimmed = target
        .trim()
        .trim_start_matches("https://github.com/")
        .trim_matches('/');
    let mut parts = trimmed.splitn(3, '/');
    let owner = parts.next().unwrap_or_default();
    let repo = parts.next().unwrap_or_default();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() {
        return Err(ModError::InvalidSpec {
            spec: format!("github:{target}"),
            reason: "expected owner/repo".to_string(),
        });
    }
    let subdir = parts
        .next()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);
    Ok((format!("{owner}/{repo}"), subdir))
}
