//! `workspaced.mod.toml`: named source aliases.
//!
//! ```toml
//! [sources]
//! dots = "github:me/dotfiles@main"
//! work = "local:../work-modules"
//!
//! [registry]
//! index = "registry.toml"
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::source_spec::{SourceSpec, split_github};
use crate::config::toml_loader::load_config;
use crate::error::ModError;

/// File name of the mod-file inside the workspace root.
pub const MODFILE_NAME: &str = "workspaced.mod.toml";

/// Parsed mod-file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModFile {
    /// Alias name to source string.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
    /// Optional `[registry]` table.
    #[serde(default)]
    pub registry: Option<RegistrySettings>,
}

/// `[registry]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    /// Path to the registry index, relative to the workspace root.
    pub index: String,
}

/// A normalized alias declaration.
///
/// Exactly one locator field is set, according to the provider:
/// `path` for `local`/`core`, `repo` for `github`, `url` for `http(s)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDecl {
    /// Alias name as declared under `[sources]`.
    pub alias: String,
    /// Provider the alias resolves through.
    pub provider: String,
    /// Directory, for `local` and `core`.
    pub path: Option<String>,
    /// `owner/name`, for `github`.
    pub repo: Option<String>,
    /// Tarball url, for `http(s)`.
    pub url: Option<String>,
    /// Requested ref (`github` only).
    pub reference: Option<String>,
}

impl SourceDecl {
    /// Normalize the source string of alias `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`ModError`] when the string does not parse, names a provider
    /// that cannot back an alias, or pins a version on a provider without
    /// versions.
    pub fn parse(alias: &str, raw: &str) -> Result<Self, ModError> {
        let spec = SourceSpec::parse(raw)?;
        let mut decl = Self {
            alias: alias.to_string(),
            provider: spec.provider.clone(),
            path: None,
            repo: None,
            url: None,
            reference: None,
        };
        let no_version = |spec: &SourceSpec| match &spec.version {
            Some(_) => Err(ModError::VersionNotSupported {
                provider: spec.provider.clone(),
                spec: raw.to_string(),
            }),
            None => Ok(()),
        };
        match spec.provider.as_str() {
            "local" | "core" => {
                no_version(&spec)?;
                decl.path = Some(spec.target.trim().to_string());
            }
            "github" => {
                let (repo, subdir) = split_github(&spec.target)?;
                if subdir.is_some() {
                    return Err(ModError::InvalidSpec {
                        spec: raw.to_string(),
                        reason: "source aliases name a repository; select subdirectories in the module spec".to_string(),
                    });
                }
                decl.repo = Some(repo);
                decl.reference = spec.version;
            }
            "http" | "https" => {
                no_version(&spec)?;
                decl.url = Some(spec.source());
            }
            other => {
                return Err(ModError::InvalidSpec {
                    spec: raw.to_string(),
                    reason: format!("provider '{other}' cannot back a source alias"),
                });
            }
        }
        Ok(decl)
    }

    /// The locator string the provider resolves (path, repo, or url).
    #[must_use]
    pub fn locator(&self) -> &str {
        self.path
            .as_deref()
            .or(self.repo.as_deref())
            .or(self.url.as_deref())
            .unwrap_or_default()
    }

    /// `provider:locator`, used to compare against the lockfile.
    #[must_use]
    pub fn source(&self) -> String {
        match self.provider.as_str() {
            "http" | "https" => self.locator().to_string(),
            _ => format!("{}:{}", self.provider, self.locator()),
        }
    }
}

impl ModFile {
    /// Load the mod-file; a missing file yields no aliases.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::Load`] if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, ModError> {
        load_config(path).map_err(|e| ModError::Load {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })
    }

    /// Normalized declaration of `alias`, if declared.
    ///
    /// # Errors
    ///
    /// Returns [`ModError`] when the declared string is invalid.
    pub fn alias(&self, alias: &str) -> Result<Option<SourceDecl>, ModError> {
        self.sources
            .get(alias)
            .map(|raw| SourceDecl::parse(alias, raw))
            .transpose()
    }

    /// Registry index path resolved against `root`.
    #[must_use]
    pub fn registry_index(&self, root: &Path) -> Option<PathBuf> {
        self.registry.as_ref().map(|r| root.join(&r.index))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn modfile(text: &str) -> ModFile {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn github_alias_with_ref() {
        let m = modfile("[sources]\ndots = \"github:me/dotfiles@main\"\n");
        let decl = m.alias("dots").unwrap().unwrap();
        assert_eq!(decl.provider, "github");
        assert_eq!(decl.repo.as_deref(), Some("me/dotfiles"));
        assert_eq!(decl.reference.as_deref(), Some("main"));
        assert_eq!(decl.source(), "github:me/dotfiles");
    }

    #[test]
    fn local_alias_keeps_path_as_written() {
        let decl = SourceDecl::parse("work", "local:../work").unwrap();
        assert_eq!(decl.path.as_deref(), Some("../work"));
        assert_eq!(decl.locator(), "../work");
    }

    #[test]
    fn http_alias_keeps_url() {
        let decl = SourceDecl::parse("t", "https://example.com/t.tar.gz").unwrap();
        assert_eq!(decl.url.as_deref(), Some("https://example.com/t.tar.gz"));
        assert_eq!(decl.source(), "https://example.com/t.tar.gz");
    }

    #[test]
    fn versions_rejected_for_unversioned_providers() {
        for raw in ["local:x@v1", "core:base@v1", "https://h/x.tgz@v1"] {
            let err = SourceDecl::parse("a", raw).unwrap_err();
            assert!(matches!(err, ModError::VersionNotSupported { .. }), "{raw}");
        }
    }

    #[test]
    fn alias_of_alias_rejected() {
        let err = SourceDecl::parse("a", "dots:x").unwrap_err();
        assert!(matches!(err, ModError::InvalidSpec { .. }));
    }

    #[test]
    fn unknown_alias_is_none() {
        assert!(ModFile::default().alias("nope").unwrap().is_none());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let m = ModFile::load(&dir.path().join(MODFILE_NAME)).unwrap();
        assert!(m.sources.is_empty());
        assert!(m.registry_index(dir.path()).is_none());
    }

    #[test]
    fn unknown_keys_are_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MODFILE_NAME);
        std::fs::write(&path, "[aliases]\nx = \"local:y\"\n").unwrap();
        assert!(matches!(ModFile::load(&path), Err(ModError::Load { .. })));
    }
}
