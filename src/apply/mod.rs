//! Executor: plans, applies actions, and produces the next state.
//!
//! Deletes run first, sequentially, so a path moving between modules is
//! freed before it is written.  Creates and updates then run on a worker
//! pool.  Every action fails on its own: a failure keeps the previous state
//! entry for that path and is reported in [`ApplyOutcome::failures`].
pub mod write;

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::PlanError;
use crate::logging::{ActionEntry, ActionStatus, Log};
use crate::plan::{Action, ActionKind, PlanSummary, Planner};
use crate::source::DesiredFile;
use crate::state::{ManagedEntry, State};

use write::Removal;

/// Knobs for [`apply`].
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Plan and report only.
    pub dry_run: bool,
    /// Worker count for planning and writing.
    pub jobs: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: Planner::new().jobs(),
        }
    }
}

/// A single action that could not be applied.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Kind of the failed action.
    pub kind: ActionKind,
    /// Absolute target path.
    pub target: PathBuf,
    /// Error chain, outermost first.
    pub message: String,
}

/// Result of an apply pass.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// Every planned action, in plan order.
    pub actions: Vec<Action>,
    /// Next state; `None` when nothing changed or on a dry run.
    pub state: Option<State>,
    /// Actions that could not be applied.
    pub failures: Vec<Failure>,
}

impl ApplyOutcome {
    /// Counts of the planned actions by kind.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary::from_actions(&self.actions)
    }

    /// Whether every action was applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn entry_for(desired: &DesiredFile) -> ManagedEntry {
    ManagedEntry {
        source_info: desired.source_info().to_string(),
        kind: desired.kind(),
    }
}

/// Shared bookkeeping for one pass.
struct Run<'a> {
    log: &'a dyn Log,
    state: Mutex<State>,
    failures: Mutex<Vec<Failure>>,
}

impl Run<'_> {
    fn record(&self, action: &Action, status: ActionStatus, message: Option<String>) {
        if status == ActionStatus::Failed {
            self.failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Failure {
                    kind: action.kind(),
                    target: action.target().to_path_buf(),
                    message: message.clone().unwrap_or_default(),
                });
        }
        self.log.record_action(ActionEntry {
            kind: action.kind(),
            target: action.target().to_path_buf(),
            status,
            message,
        });
    }

    fn delete(&self, action: &Action, cancel: &CancelToken) {
        let Action::Delete { target, prior } = action else {
            return;
        };
        if cancel.is_cancelled() {
            self.record(action, ActionStatus::Skipped, Some("cancelled".to_string()));
            return;
        }
        match write::remove_managed(target, prior.kind) {
            Ok(Removal::Removed | Removal::Missing) => {
                self.log.debug(&format!("deleted {}", target.display()));
                self.state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(target);
                self.record(action, ActionStatus::Applied, None);
            }
            Ok(Removal::TypeChanged) => {
                self.log.warn(&format!(
                    "{} is no longer a {}, leaving it in place",
                    target.display(),
                    prior.kind
                ));
                self.state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(target);
                self.record(action, ActionStatus::Skipped, Some("type changed".to_string()));
            }
            Err(e) => self.record(action, ActionStatus::Failed, Some(format!("{e:#}"))),
        }
    }

    fn write(&self, action: &Action, cancel: &CancelToken) {
        let (target, desired) = match action {
            Action::Create { target, desired } | Action::Update { target, desired, .. } => {
                (target, desired)
            }
            Action::Delete { .. } | Action::Noop { .. } => return,
        };
        if cancel.is_cancelled() {
            self.record(action, ActionStatus::Skipped, Some("cancelled".to_string()));
            return;
        }
        match write::write_desired(target, desired) {
            Ok(()) => {
                self.log.debug(&format!("{} {}", action.kind(), target.display()));
                self.state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(target.clone(), entry_for(desired));
                self.record(action, ActionStatus::Applied, None);
            }
            Err(e) => self.record(action, ActionStatus::Failed, Some(format!("{e:#}"))),
        }
    }
}

/// Plan `desired` against `previous` and, unless dry-running, apply it.
///
/// # Errors
///
/// Returns a [`PlanError`] if planning fails; nothing has been written in
/// that case.  Per-action failures do not error; see
/// [`ApplyOutcome::failures`].
pub fn apply(
    desired: &[DesiredFile],
    previous: &State,
    options: &ApplyOptions,
    log: &dyn Log,
    cancel: &CancelToken,
) -> Result<ApplyOutcome, PlanError> {
    let actions = Planner::with_jobs(options.jobs).plan(desired, previous, cancel)?;

    if options.dry_run {
        for action in actions.iter().filter(|a| a.kind() != ActionKind::Noop) {
            log.dry_run(&action.to_string());
            log.record_action(ActionEntry {
                kind: action.kind(),
                target: action.target().to_path_buf(),
                status: ActionStatus::DryRun,
                message: None,
            });
        }
        return Ok(ApplyOutcome {
            actions,
            state: None,
            failures: Vec::new(),
        });
    }

    let run = Run {
        log,
        state: Mutex::new(previous.clone()),
        failures: Mutex::new(Vec::new()),
    };

    for action in actions.iter().filter(|a| a.kind() == ActionKind::Delete) {
        run.delete(action, cancel);
    }

    let writes: Vec<&Action> = actions
        .iter()
        .filter(|a| matches!(a.kind(), ActionKind::Create | ActionKind::Update))
        .collect();
    if options.jobs > 1 && writes.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .thread_name(|i| format!("workspaced-apply-{i}"))
            .build()
            .map_err(|e| PlanError::WorkerPool(e.to_string()))?;
        pool.install(|| writes.par_iter().for_each(|action| run.write(action, cancel)));
    } else {
        for action in &writes {
            run.write(action, cancel);
        }
    }

    let state = run.state.into_inner().unwrap_or_else(PoisonError::into_inner);
    let failures = run
        .failures
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    let state = (state != *previous).then_some(state);
    Ok(ApplyOutcome {
        actions,
        state,
        failures,
    })
}
