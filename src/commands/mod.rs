//! Subcommand orchestration: open the workspace, run the pipeline, plan
//! and apply.
pub mod apply;
pub mod lock;
pub mod plan;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cancel::CancelToken;
use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::exec::{Executor, SystemExecutor};
use crate::fetch::HttpFetcher;
use crate::logging::{Log, Logger};
use crate::modules::modfile::{MODFILE_NAME, ModFile};
use crate::modules::providers::ProviderRegistry;
use crate::modules::providers::github::GitRefLookup;
use crate::modules::resolver::{LockMode, Resolver};
use crate::modules::sumfile::{SUMFILE_NAME, SumFile};
use crate::modules::{ProviderDeps, default_providers};
use crate::plan::Planner;
use crate::source::conflict::ConflictResolver;
use crate::source::dotd::DotDProcessor;
use crate::source::module_scanner::ModuleScanner;
use crate::source::scanner::Scanner;
use crate::source::template::TemplateExpander;
use crate::source::{DesiredFile, Pipeline, PipelineContext};

/// Workspace root from `--root` / `WORKSPACED_ROOT`, else the current
/// directory.
///
/// # Errors
///
/// Returns an error if the directory does not exist.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    let root = match &global.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("determining current directory")?,
    };
    dunce::canonicalize(&root).with_context(|| format!("workspace root {}", root.display()))
}

/// Loaded configuration plus the resolver built from it.
#[derive(Debug)]
pub struct Workspace {
    /// Parsed `workspaced.toml`.
    pub config: Config,
    /// Resolver shared by the module scanner and `lock`.
    pub resolver: Arc<Resolver>,
    executor: Arc<dyn Executor>,
}

impl Workspace {
    /// Load the workspace at `root` with the default providers.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration file fails to load.
    pub fn open(root: &Path, mode: LockMode) -> Result<Self> {
        let config = Config::load(root)?;
        let providers = default_providers(ProviderDeps {
            core_root: config.core_modules_dir.clone(),
            cache_root: config.cache_dir.clone(),
            fetcher: Arc::new(HttpFetcher::default()),
            refs: Arc::new(GitRefLookup::default()),
        });
        Self::with_providers(config, providers, mode)
    }

    /// Load the mod-file and lockfile next to `config` and wire `providers`
    /// into a resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the mod-file, lockfile or registry index fails to
    /// load.
    pub fn with_providers(config: Config, providers: ProviderRegistry, mode: LockMode) -> Result<Self> {
        let modfile = ModFile::load(&config.root.join(MODFILE_NAME))?;
        let lock = match mode {
            LockMode::Enforce => SumFile::load(&config.root.join(SUMFILE_NAME))?,
            LockMode::Relock => None,
        };
        let resolver = Resolver::new(providers, modfile, &config.root, lock, mode)?;
        Ok(Self {
            config,
            resolver: Arc::new(resolver),
            executor: Arc::new(SystemExecutor),
        })
    }

    /// Scanner → modules → templates → dot-d → conflict check.
    ///
    /// # Errors
    ///
    /// Returns an error if the template data cannot be built.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let config = &self.config;
        Ok(Pipeline::new()
            .with(Scanner::new(&config.sources_dir, &config.home))
            .with(ModuleScanner::new(
                Arc::clone(&self.resolver),
                config.modules.clone(),
                &config.home,
                &config.bin_dir,
                Arc::clone(&self.executor),
            ))
            .with(TemplateExpander::new(config.template_data()?))
            .with(DotDProcessor)
            .with(ConflictResolver))
    }

    /// Run the pipeline and return the desired file set.
    ///
    /// # Errors
    ///
    /// Returns the first plugin failure.
    pub fn desired(&self, cancel: &CancelToken) -> Result<Vec<DesiredFile>> {
        let ctx = PipelineContext {
            cancel: cancel.clone(),
        };
        self.pipeline()?.run(&ctx)
    }

    /// Worker count: 1 with `--no-parallel`, else the configured `jobs` or
    /// the available parallelism.
    #[must_use]
    pub fn jobs(&self, parallel: bool) -> usize {
        if !parallel {
            return 1;
        }
        self.config
            .jobs
            .unwrap_or_else(|| Planner::new().jobs())
    }

    /// Path of the workspace lockfile.
    #[must_use]
    pub fn sumfile_path(&self) -> PathBuf {
        self.config.root.join(SUMFILE_NAME)
    }
}

/// Open the workspace and collect the desired files, logging progress.
///
/// # Errors
///
/// Returns an error if loading or the pipeline fails.
pub fn load_desired(
    global: &GlobalOpts,
    log: &Logger,
    cancel: &CancelToken,
) -> Result<(Workspace, Vec<DesiredFile>)> {
    let root = resolve_root(global)?;
    log.stage("Loading workspace");
    let workspace = Workspace::open(&root, LockMode::Enforce)?;
    log.info(&format!(
        "root {}, {} module(s) enabled",
        root.display(),
        workspace.config.enabled_modules().len()
    ));

    log.stage("Collecting desired files");
    let desired = workspace.desired(cancel)?;
    log.info(&format!("{} desired file(s)", desired.len()));
    Ok((workspace, desired))
}
