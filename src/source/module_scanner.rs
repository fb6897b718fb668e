//! Module scanner: resolves enabled modules and emits their files.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use rayon::prelude::*;

use super::{BUNDLE_PREFIX, DesiredFile, PipelineContext, Plugin, shim};
use crate::config::ModuleConfig;
use crate::error::PipelineError;
use crate::exec::Executor;
use crate::modules::manifest::ModuleManifest;
use crate::modules::resolver::{ResolvedModule, Resolver};
use crate::platform::expand_path;

/// Resolves every enabled module and emits its files and shims.
pub struct ModuleScanner {
    resolver: Arc<Resolver>,
    modules: BTreeMap<String, ModuleConfig>,
    home: PathBuf,
    bin_dir: PathBuf,
    executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for ModuleScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleScanner")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("home", &self.home)
            .field("bin_dir", &self.bin_dir)
            .finish_non_exhaustive()
    }
}

impl ModuleScanner {
    /// Module files land in `home` unless the module config or manifest
    /// names another target; shims land in `bin_dir`.
    #[must_use]
    pub fn new(
        resolver: Arc<Resolver>,
        modules: BTreeMap<String, ModuleConfig>,
        home: impl Into<PathBuf>,
        bin_dir: impl Into<PathBuf>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            resolver,
            modules,
            home: home.into(),
            bin_dir: bin_dir.into(),
            executor,
        }
    }

    fn module_files(&self, config: &ModuleConfig, module: ResolvedModule) -> Result<Vec<DesiredFile>> {
        let manifest = ModuleManifest::load(&module.dir)?;
        let target = match config.target.as_deref().or(manifest.target.as_deref()) {
            Some(raw) => expand_path(raw, &self.home)?,
            None => self.home.clone(),
        };

        let mut files = Vec::with_capacity(module.files.len() + manifest.bins.len());
        for found in module.files {
            let source_info = match &module.bundle_hash {
                Some(hash) => format!(
                    "{BUNDLE_PREFIX}{}@{hash}:{}",
                    module.name,
                    found.rel_path.display()
                ),
                None => format!("module:{}:{}", module.name, found.source_path.display()),
            };
            files.push(match found.link_target {
                Some(link) => DesiredFile::symlink(found.rel_path, &target, source_info, link),
                None => DesiredFile::from_path(
                    found.rel_path,
                    &target,
                    found.mode,
                    source_info,
                    found.source_path,
                ),
            });
        }

        for (bin, argv) in &manifest.bins {
            let script = shim::render(argv)
                .map_err(|e| anyhow::anyhow!("module '{}' bin '{bin}': {e}", module.name))?;
            if let Some(program) = argv.first()
                && !self.executor.which(program)
            {
                tracing::warn!(module = %module.name, bin = %bin, program = %program, "shim target not found on PATH");
            }
            files.push(DesiredFile::from_bytes(
                shim::shim_file_name(bin),
                &self.bin_dir,
                shim::SHIM_MODE,
                format!("shim:{}:{bin}", module.name),
                script,
            ));
        }
        Ok(files)
    }
}

impl Plugin for ModuleScanner {
    fn name(&self) -> &str {
        "modules"
    }

    fn process(&self, ctx: &PipelineContext, mut files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>> {
        let enabled: Vec<(&String, &ModuleConfig)> =
            self.modules.iter().filter(|(_, m)| m.enable).collect();

        let per_module: Vec<Vec<DesiredFile>> = enabled
            .par_iter()
            .map(|(name, config)| {
                if ctx.cancel.is_cancelled() {
                    bail!("cancelled before module '{name}'");
                }
                let wrap = |source: anyhow::Error| PipelineError::Module {
                    module: (*name).clone(),
                    source,
                };
                let module = self
                    .resolver
                    .resolve_module(name, &config.source)
                    .map_err(|e| wrap(e.into()))?;
                tracing::debug!(module = %name, files = module.files.len(), source = %module.source, "resolved module");
                self.module_files(config, module).map_err(|e| wrap(e).into())
            })
            .collect::<Result<_>>()?;

        files.extend(per_module.into_iter().flatten());
        Ok(files)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::modules::modfile::ModFile;
    use crate::modules::providers::ProviderRegistry;
    use crate::modules::providers::local::LocalProvider;
    use crate::modules::resolver::LockMode;
    use std::path::Path;

    #[derive(Debug)]
    struct NoPrograms;

    impl Executor for NoPrograms {
        fn which(&self, _: &str) -> bool {
            false
        }
    }

    fn scanner(root: &Path, modules: &[(&str, &str, Option<&str>, bool)]) -> ModuleScanner {
        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(LocalProvider));
        let resolver =
            Resolver::new(providers, ModFile::default(), root, None, LockMode::Enforce).unwrap();
        let modules = modules
            .iter()
            .map(|(name, source, target, enable)| {
                (
                    (*name).to_string(),
                    ModuleConfig {
                        enable: *enable,
                        source: (*source).to_string(),
                        target: target.map(ToString::to_string),
                    },
                )
            })
            .collect();
        ModuleScanner::new(
            Arc::new(resolver),
            modules,
            "/home/u",
            "/home/u/.local/bin",
            Arc::new(NoPrograms),
        )
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mods/nvim/lua")).unwrap();
        std::fs::write(dir.path().join("mods/nvim/init.lua"), "-- init").unwrap();
        std::fs::write(dir.path().join("mods/nvim/lua/a.lua"), "-- a").unwrap();
        std::fs::write(
            dir.path().join("mods/nvim/module.toml"),
            "target = \"/home/u/.config/nvim\"\n[bins]\nvi = [\"nvim\"]\n",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("mods/git")).unwrap();
        std::fs::write(dir.path().join("mods/git/.gitconfig"), "[user]").unwrap();
        dir
    }

    #[test]
    fn emits_module_files_and_shims() {
        let ws = workspace();
        let s = scanner(ws.path(), &[("nvim", "local:mods/nvim", None, true)]);
        let files = s.process(&PipelineContext::default(), Vec::new()).unwrap();
        let targets: Vec<_> = files.iter().map(DesiredFile::target_path).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/home/u/.config/nvim/init.lua"),
                PathBuf::from("/home/u/.config/nvim/lua/a.lua"),
                PathBuf::from(format!("/home/u/.local/bin/{}", shim::shim_file_name("vi"))),
            ]
        );
        assert!(files[0].source_info().starts_with("module:nvim:"));
        assert_eq!(files[2].mode(), shim::SHIM_MODE);
        assert_eq!(files[2].source_info(), "shim:nvim:vi");
    }

    #[test]
    fn config_target_overrides_manifest() {
        let ws = workspace();
        let s = scanner(ws.path(), &[("nvim", "local:mods/nvim", Some("/opt/nvim"), true)]);
        let files = s.process(&PipelineContext::default(), Vec::new()).unwrap();
        assert_eq!(files[0].target_path(), PathBuf::from("/opt/nvim/init.lua"));
    }

    #[test]
    fn disabled_modules_are_skipped_and_order_is_by_name() {
        let ws = workspace();
        let s = scanner(
            ws.path(),
            &[
                ("nvim", "local:mods/nvim", None, false),
                ("git", "local:mods/git", None, true),
            ],
        );
        let files = s.process(&PipelineContext::default(), Vec::new()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].target_path(), PathBuf::from("/home/u/.gitconfig"));
    }

    #[test]
    fn module_failure_names_module() {
        let ws = workspace();
        let s = scanner(ws.path(), &[("broken", "local:mods/absent", None, true)]);
        let err = s.process(&PipelineContext::default(), Vec::new()).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Module { module, .. }) => assert_eq!(module, "broken"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
