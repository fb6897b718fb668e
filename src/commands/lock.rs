//! Command: regenerate `workspaced.sum.toml`.
use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};
use crate::modules::resolver::LockMode;
use crate::modules::sumfile::SUMFILE_NAME;

use super::Workspace;

/// Resolve every alias and enabled module from scratch and write the
/// lockfile.  With `--dry-run` the lockfile is printed to the log instead.
///
/// # Errors
///
/// Returns an error if any source fails to resolve or the file cannot be
/// written.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let root = super::resolve_root(global)?;
    let workspace = Workspace::open(&root, LockMode::Relock)?;

    log.stage("Resolving sources");
    let sum = workspace
        .resolver
        .lock(workspace.config.enabled_modules())?;
    log.info(&format!(
        "{} source(s), {} module(s)",
        sum.sources.len(),
        sum.modules.len()
    ));

    let path = workspace.sumfile_path();
    if global.dry_run {
        log.dry_run(&format!("would write {}", path.display()));
        for line in sum.render()?.lines() {
            log.debug(line);
        }
        return Ok(());
    }
    sum.save(&path)
        .with_context(|| format!("writing {SUMFILE_NAME}"))?;
    log.info(&format!("wrote {}", path.display()));
    Ok(())
}
