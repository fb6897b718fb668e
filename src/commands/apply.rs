//! Command: reconcile targets and persist state.
use anyhow::{Context as _, Result, bail};

use crate::apply::{ApplyOptions, apply};
use crate::cancel::CancelToken;
use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};
use crate::state::State;

/// Apply the plan, save the new state, and fail if any action failed.
///
/// State is written even when some actions failed, so the successful ones
/// are remembered.
///
/// # Errors
///
/// Returns an error if loading, the pipeline, planning, or saving state
/// fails, or if one or more actions failed.
pub fn run(global: &GlobalOpts, log: &Logger, cancel: &CancelToken) -> Result<()> {
    let (workspace, desired) = super::load_desired(global, log, cancel)?;
    let state_file = &workspace.config.state_file;
    let previous = State::load(state_file)?;

    log.stage(if global.dry_run { "Planning (dry run)" } else { "Applying" });
    let options = ApplyOptions {
        dry_run: global.dry_run,
        jobs: workspace.jobs(global.parallel),
    };
    let outcome = apply(&desired, &previous, &options, log, cancel)?;
    log.debug(&outcome.summary().to_string());

    if let Some(state) = &outcome.state {
        state
            .save(state_file)
            .with_context(|| format!("saving state to {}", state_file.display()))?;
        log.debug(&format!("state saved to {}", state_file.display()));
    }

    log.print_summary();
    let failed = outcome.failures.len();
    if failed > 0 {
        bail!("{failed} action(s) failed");
    }
    if cancel.is_cancelled() {
        bail!("interrupted");
    }
    Ok(())
}
