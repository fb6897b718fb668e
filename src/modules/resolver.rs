//! Module and source resolution with lockfile enforcement.
//!
//! A module source is either a built-in provider (`local:`, `github:` ...),
//! a `registry:` name looked up in the registry index, or `<alias>:<subdir>`
//! where the alias is declared in the mod-file.  Resolution compares what
//! the configuration asks for with what the lockfile recorded:
//!
//! * a different source is a [`ModError::LockMismatch`];
//! * an explicit version different from the locked one is a
//!   [`ModError::VersionConflict`];
//! * an unpinned request inherits the locked revision and hash.
//!
//! Entries missing from the lockfile resolve with a warning.  Normal runs
//! never write the lockfile; [`Resolver::lock`] does.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::index::RegistryIndex;
use super::manifest::MANIFEST_NAME;
use super::modfile::{ModFile, SourceDecl};
use super::providers::{ProviderRegistry, ResolvedSource, SourceProvider, SourceRequest};
use super::source_spec::{SourceSpec, split_github};
use super::sumfile::{LockedModule, LockedSource, SumFile};
use super::tree::{ResolvedFile, list_files};
use crate::error::ModError;
use crate::platform::expand_path;

/// How the lockfile is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Enforce existing entries, warn about missing ones.
    #[default]
    Enforce,
    /// Ignore existing entries; used when regenerating the lockfile.
    Relock,
}

/// One alias, resolved at most once per run.
type AliasSlot = Arc<Mutex<Option<ResolvedSource>>>;

/// A built-in module source, normalized but not yet fetched.
struct BuiltinRequest<'a> {
    provider: &'a Arc<dyn SourceProvider>,
    /// Locator as the provider expects it.
    locator: String,
    /// Subdirectory inside a GitHub repository.
    subdir: Option<PathBuf>,
    /// Normalized source string, without version.
    source: String,
}

/// A module ready to be turned into desired files.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// Module name from the configuration.
    pub name: String,
    /// Normalized source string, without version.
    pub source: String,
    /// Resolved revision, when the source has one.
    pub rev: Option<String>,
    /// Content hash of the immutable bundle the module came from.
    pub bundle_hash: Option<String>,
    /// Module directory.
    pub dir: PathBuf,
    /// Files found under `dir`, manifest excluded.
    pub files: Vec<ResolvedFile>,
}

/// Resolves module sources against the providers, mod-file and lockfile.
///
/// Shared between pipeline workers; each alias is fetched at most once per
/// run and every resolution is recorded for [`Resolver::lock`].
pub struct Resolver {
    providers: ProviderRegistry,
    modfile: ModFile,
    root: PathBuf,
    lock: SumFile,
    index: Option<RegistryIndex>,
    mode: LockMode,
    aliases: Mutex<HashMap<String, AliasSlot>>,
    recorded: Mutex<SumFile>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("providers", &self.providers)
            .field("root", &self.root)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn guard<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Resolver {
    /// Create a resolver for the workspace at `root`.
    ///
    /// Local paths in source strings are relative to `root`.  `lock` is the
    /// parsed lockfile, or `None` if the workspace has none.
    ///
    /// # Errors
    ///
    /// Returns [`ModError::Load`] if the mod-file names a registry index
    /// that cannot be loaded.
    pub fn new(
        providers: ProviderRegistry,
        modfile: ModFile,
        root: impl Into<PathBuf>,
        lock: Option<SumFile>,
        mode: LockMode,
    ) -> Result<Self, ModError> {
        let root = root.into();
        let index = modfile
            .registry_index(&root)
            .map(|path| RegistryIndex::load(&path))
            .transpose()?;
        Ok(Self {
            providers,
            modfile,
            root,
            lock: lock.unwrap_or_default(),
            index,
            mode,
            aliases: Mutex::new(HashMap::new()),
            recorded: Mutex::new(SumFile::default()),
        })
    }

    fn locked_source(&self, alias: &str) -> Option<&LockedSource> {
        match self.mode {
            LockMode::Enforce => self.lock.sources.get(alias),
            LockMode::Relock => None,
        }
    }

    fn locked_module(&self, name: &str) -> Option<&LockedModule> {
        match self.mode {
            LockMode::Enforce => self.lock.modules.get(name),
            LockMode::Relock => None,
        }
    }

    /// Turn a `local`/`core` locator into what the provider expects.
    fn provider_locator(&self, provider: &str, locator: &str) -> Result<String, ModError> {
        if provider != "local" {
            return Ok(locator.to_string());
        }
        let path = expand_path(locator, &self.root).map_err(|e| ModError::InvalidSpec {
            spec: format!("local:{locator}"),
            reason: e.to_string(),
        })?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// Resolve a mod-file alias, fetching it at most once per run.
    ///
    /// Concurrent callers asking for the same alias wait for the first one,
    /// so every module on an alias sees the same revision.
    ///
    /// # Errors
    ///
    /// Returns [`ModError`] when the alias is unknown or invalid, conflicts
    /// with the lockfile, or cannot be fetched.
    pub fn resolve_alias(&self, alias: &str) -> Result<ResolvedSource, ModError> {
        let slot = Arc::clone(guard(&self.aliases).entry(alias.to_string()).or_default());
        let mut cached = guard(&*slot);
        if let Some(resolved) = cached.as_ref() {
            return Ok(resolved.clone());
        }
        let resolved = self.fetch_alias(alias)?;
        *cached = Some(resolved.clone());
        Ok(resolved)
    }

    fn fetch_alias(&self, alias: &str) -> Result<ResolvedSource, ModError> {
        let decl = self
            .modfile
            .alias(alias)?
            .ok_or_else(|| ModError::UnknownProvider {
                provider: alias.to_string(),
                spec: alias.to_string(),
            })?;
        let provider = self
            .providers
            .get(&decl.provider)
            .ok_or_else(|| ModError::UnknownProvider {
                provider: decl.provider.clone(),
                spec: decl.source(),
            })?;

        let locked = self.locked_source(alias);
        let (locked_rev, locked_hash) = match locked {
            Some(entry) => {
                check_source(alias, &entry.source(), &decl.source())?;
                if let (Some(requested), Some(pinned)) = (&decl.reference, &entry.reference)
                    && requested != pinned
                {
                    return Err(ModError::VersionConflict {
                        name: alias.to_string(),
                        locked: pinned.clone(),
                        requested: requested.clone(),
                    });
                }
                (entry.rev.as_deref(), entry.hash.as_deref())
            }
            None => {
                if self.mode == LockMode::Enforce && provider.lockable() {
                    warn!(alias, "source is not locked; run `workspaced lock` to pin it");
                }
                (None, None)
            }
        };

        let locator = self.provider_locator(&decl.provider, decl.locator())?;
        let resolved = provider.resolve(&SourceRequest {
            name: alias,
            locator: &locator,
            version: decl.reference.as_deref(),
            locked_rev,
            locked_hash,
        })?;
        debug!(alias, root = %resolved.root.display(), "resolved source alias");

        guard(&self.recorded)
            .sources
            .insert(alias.to_string(), locked_entry(&decl, locked, &resolved));
        Ok(resolved)
    }

    /// Resolve module `name` declared with source string `raw`.
    ///
    /// The request is checked against the lockfile before anything is
    /// fetched.
    ///
    /// # Errors
    ///
    /// Returns [`ModError`] for invalid sources, lockfile conflicts, fetch
    /// failures, and missing module directories.
    pub fn resolve_module(&self, name: &str, raw: &str) -> Result<ResolvedModule, ModError> {
        let mut spec = SourceSpec::parse(raw)?;
        if spec.provider == "registry" {
            let index = self.index.as_ref().ok_or_else(|| ModError::InvalidSpec {
                spec: raw.to_string(),
                reason: "no [registry] index configured in the mod-file".to_string(),
            })?;
            spec = index.lookup(&spec.target, spec.version.as_deref())?;
            debug!(module = name, source = %spec, "registry entry");
        }

        let builtin = if spec.is_builtin() {
            Some(self.builtin_request(&spec)?)
        } else if let Some(version) = &spec.version {
            return Err(ModError::InvalidSpec {
                spec: raw.to_string(),
                reason: format!(
                    "'{version}' cannot be pinned here; pin the version on source alias '{}'",
                    spec.provider
                ),
            });
        } else {
            None
        };
        let (source, lockable, versioned) = match &builtin {
            Some(b) => (b.source.clone(), b.provider.lockable(), b.provider.versioned()),
            None => (spec.source(), false, false),
        };
        let requested = spec.version.clone();

        let locked = self.locked_module(name);
        if let Some(entry) = locked {
            check_source(name, &entry.source, &source)?;
            if versioned
                && let Some(requested) = &requested
                && !entry.version.is_empty()
                && requested != &entry.version
            {
                return Err(ModError::VersionConflict {
                    name: name.to_string(),
                    locked: entry.version.clone(),
                    requested: requested.clone(),
                });
            }
        } else if self.mode == LockMode::Enforce && lockable {
            warn!(module = name, "module is not locked; run `workspaced lock` to pin it");
        }

        let (source_root, subdir) = match builtin {
            Some(b) => {
                let resolved = b.provider.resolve(&SourceRequest {
                    name,
                    locator: &b.locator,
                    version: requested.as_deref(),
                    locked_rev: locked.and_then(|e| e.rev.as_deref()),
                    locked_hash: locked.and_then(|e| e.hash.as_deref()),
                })?;
                (resolved, b.subdir)
            }
            None => {
                let subdir = relative_subdir(raw, &spec.target)?;
                (self.resolve_alias(&spec.provider)?, Some(subdir))
            }
        };

        let dir = match &subdir {
            Some(sub) => source_root.root.join(sub),
            None => source_root.root.clone(),
        };
        if !dir.is_dir() {
            return Err(ModError::NotFound { path: dir });
        }
        let files = list_files(&dir, &[".git"], &[MANIFEST_NAME])?;

        guard(&self.recorded).modules.insert(
            name.to_string(),
            LockedModule {
                source: source.clone(),
                version: requested
                    .or_else(|| source_root.rev.clone())
                    .unwrap_or_default(),
                rev: lockable.then(|| source_root.rev.clone()).flatten(),
                hash: lockable.then(|| source_root.hash.clone()).flatten(),
            },
        );

        Ok(ResolvedModule {
            name: name.to_string(),
            source,
            rev: source_root.rev.clone(),
            bundle_hash: source_root.hash.clone(),
            dir,
            files,
        })
    }

    /// Normalize a module source that names a built-in provider.
    fn builtin_request(&self, spec: &SourceSpec) -> Result<BuiltinRequest<'_>, ModError> {
        let provider = self
            .providers
            .get(&spec.provider)
            .ok_or_else(|| ModError::UnknownProvider {
                provider: spec.provider.clone(),
                spec: spec.to_string(),
            })?;
        if spec.version.is_some() && !provider.versioned() {
            return Err(ModError::VersionNotSupported {
                provider: spec.provider.clone(),
                spec: spec.to_string(),
            });
        }

        let (locator, subdir, source) = match spec.provider.as_str() {
            "github" => {
                let (repo, subdir) = split_github(&spec.target)?;
                let source = match &subdir {
                    Some(sub) => format!("github:{repo}/{sub}"),
                    None => format!("github:{repo}"),
                };
                (repo, subdir.map(PathBuf::from), source)
            }
            "http" | "https" => (spec.source(), None, spec.source()),
            _ => (spec.target.trim().to_string(), None, spec.source()),
        };
        Ok(BuiltinRequest {
            provider,
            locator: self.provider_locator(&spec.provider, &locator)?,
            subdir,
            source,
        })
    }

    /// Entries resolved so far in this run.
    #[must_use]
    pub fn recorded(&self) -> SumFile {
        guard(&self.recorded).clone()
    }

    /// Resolve every alias and every enabled module and return the lockfile
    /// describing them.
    ///
    /// Aliases declared in the mod-file but unused by any module are locked
    /// too; entries for aliases and modules that no longer exist are
    /// dropped because only what was resolved is recorded.
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure.
    pub fn lock<'a>(
        &self,
        modules: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<SumFile, ModError> {
        for alias in self.modfile.sources.keys() {
            self.resolve_alias(alias)?;
        }
        for (name, raw) in modules {
            self.resolve_module(name, raw)?;
        }
        Ok(self.recorded())
    }

    /// Workspace root local paths are relative to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Aliases declared in the mod-file.
    #[must_use]
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.modfile.sources
    }
}

fn check_source(name: &str, locked: &str, computed: &str) -> Result<(), ModError> {
    if locked == computed {
        Ok(())
    } else {
        Err(ModError::LockMismatch {
            name: name.to_string(),
            locked: locked.to_string(),
            computed: computed.to_string(),
        })
    }
}

fn relative_subdir(raw: &str, target: &str) -> Result<PathBuf, ModError> {
    let sub = Path::new(target.trim().trim_matches('/'));
    if sub
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir))
    {
        Ok(sub.to_path_buf())
    } else {
        Err(ModError::InvalidSpec {
            spec: raw.to_string(),
            reason: "module path must stay inside its source".to_string(),
        })
    }
}

fn locked_entry(
    decl: &SourceDecl,
    previous: Option<&LockedSource>,
    resolved: &ResolvedSource,
) -> LockedSource {
    LockedSource {
        provider: decl.provider.clone(),
        path: decl.path.clone(),
        repo: decl.repo.clone(),
        url: decl.url.clone(),
        reference: decl
            .reference
            .clone()
            .or_else(|| previous.and_then(|p| p.reference.clone())),
        rev: resolved.rev.clone(),
        hash: resolved.hash.clone(),
    }
}
