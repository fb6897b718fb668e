//! Command: show what `apply` would change.
use anyhow::Result;

use crate::cancel::CancelToken;
use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};
use crate::plan::{ActionKind, PlanSummary, Planner};
use crate::state::State;

/// Plan against the current state and print every non-noop action.
///
/// # Errors
///
/// Returns an error if loading, the pipeline, or planning fails.
pub fn run(global: &GlobalOpts, log: &Logger, cancel: &CancelToken) -> Result<()> {
    let (workspace, desired) = super::load_desired(global, log, cancel)?;
    let state = State::load(&workspace.config.state_file)?;

    log.stage("Planning");
    let actions = Planner::with_jobs(workspace.jobs(global.parallel)).plan(&desired, &state, cancel)?;
    for action in actions.iter().filter(|a| a.kind() != ActionKind::Noop) {
        log.info(&action.to_string());
    }
    for action in actions.iter().filter(|a| a.kind() == ActionKind::Noop) {
        log.debug(&action.to_string());
    }
    log.info(&PlanSummary::from_actions(&actions).to_string());
    Ok(())
}
