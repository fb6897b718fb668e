//! Planning: desired files + previous state → ordered actions.
//!
//! Desired files are compared against the filesystem on a bounded worker
//! pool.  Each worker writes into the slot matching its input index, so the
//! action order equals the pipeline order regardless of scheduling.
//! Targets recorded in the previous state but no longer desired become
//! [`Action::Delete`], appended in path order.
pub mod diff;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::PlanError;
use crate::source::DesiredFile;
use crate::state::{ManagedEntry, State};

/// One reconciliation step.
#[derive(Debug, Clone)]
pub enum Action {
    /// Target is absent.
    Create {
        /// Absolute target path.
        target: PathBuf,
        /// File to write.
        desired: DesiredFile,
    },
    /// Target exists but differs in type, content, mode or provenance.
    Update {
        /// Absolute target path.
        target: PathBuf,
        /// File to write.
        desired: DesiredFile,
        /// Entry recorded for the target; `None` when it was not managed.
        prior: Option<ManagedEntry>,
    },
    /// Target was managed but is no longer desired.
    Delete {
        /// Absolute target path.
        target: PathBuf,
        /// Entry recorded for the target.
        prior: ManagedEntry,
    },
    /// Target is already up to date.
    Noop {
        /// Absolute target path.
        target: PathBuf,
    },
}

/// Discriminant of [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    /// Target is absent.
    Create,
    /// Target differs from the desired file.
    Update,
    /// Target is no longer desired.
    Delete,
    /// Target is up to date.
    Noop,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Noop => "noop",
        })
    }
}

impl Action {
    /// Discriminant of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
            Self::Noop { .. } => ActionKind::Noop,
        }
    }

    /// Absolute target path.
    #[must_use]
    pub fn target(&self) -> &Path {
        match self {
            Self::Create { target, .. }
            | Self::Update { target, .. }
            | Self::Delete { target, .. }
            | Self::Noop { target } => target,
        }
    }

    /// Desired file for creates and updates.
    #[must_use]
    pub const fn desired(&self) -> Option<&DesiredFile> {
        match self {
            Self::Create { desired, .. } | Self::Update { desired, .. } => Some(desired),
            Self::Delete { .. } | Self::Noop { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {}", self.kind(), self.target().display())?;
        if let Some(desired) = self.desired() {
            write!(f, " ({})", desired.source_info())?;
        }
        Ok(())
    }
}

/// Counts of actions per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Targets to create.
    pub create: usize,
    /// Targets to rewrite.
    pub update: usize,
    /// Targets to remove.
    pub delete: usize,
    /// Targets already up to date.
    pub noop: usize,
}

impl PlanSummary {
    /// Count `actions` by kind.
    #[must_use]
    pub fn from_actions(actions: &[Action]) -> Self {
        let mut summary = Self::default();
        for action in actions {
            summary.record(action.kind());
        }
        summary
    }

    /// Count one more action of `kind`.
    pub fn record(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Create => self.create += 1,
            ActionKind::Update => self.update += 1,
            ActionKind::Delete => self.delete += 1,
            ActionKind::Noop => self.noop += 1,
        }
    }

    /// Number of actions that change something.
    #[must_use]
    pub const fn changes(&self) -> usize {
        self.create + self.update + self.delete
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.noop
        )
    }
}

/// Computes actions on a fixed-size worker pool.
#[derive(Debug, Clone, Copy)]
pub struct Planner {
    jobs: usize,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    /// One worker per available CPU.
    #[must_use]
    pub fn new() -> Self {
        let jobs = std::thread::available_parallelism().map_or(1, std::num::NonZero::get);
        Self::with_jobs(jobs)
    }

    /// At most `jobs` concurrent comparisons (minimum 1).
    #[must_use]
    pub fn with_jobs(jobs: usize) -> Self {
        Self { jobs: jobs.max(1) }
    }

    /// Worker count used for comparisons.
    #[must_use]
    pub const fn jobs(&self) -> usize {
        self.jobs
    }

    /// Plan `desired` against `state`.
    ///
    /// The first failing comparison cancels `cancel`; workers stop taking new
    /// items and that error is returned.  Cancellation requested from the
    /// outside yields [`PlanError::Cancelled`].  No partial result is
    /// returned on failure.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Io`], [`PlanError::Cancelled`], or
    /// [`PlanError::WorkerPool`].
    pub fn plan(
        &self,
        desired: &[DesiredFile],
        state: &State,
        cancel: &CancelToken,
    ) -> Result<Vec<Action>, PlanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("workspaced-plan-{i}"))
            .build()
            .map_err(|e| PlanError::WorkerPool(e.to_string()))?;

        let mut slots: Vec<Option<Action>> = Vec::new();
        slots.resize_with(desired.len(), || None);
        let first_error: Mutex<Option<PlanError>> = Mutex::new(None);

        let outcome = pool.install(|| {
            slots
                .par_iter_mut()
                .zip(desired.par_iter())
                .try_for_each(|(slot, file)| {
                    if cancel.is_cancelled() {
                        return Err(());
                    }
                    match diff::compare(file, state.get(&file.target_path())) {
                        Ok(action) => {
                            *slot = Some(action);
                            Ok(())
                        }
                        Err(e) => {
                            let mut first = first_error.lock().unwrap_or_else(PoisonError::into_inner);
                            if first.is_none() {
                                *first = Some(e);
                            }
                            cancel.cancel();
                            Err(())
                        }
                    }
                })
        });

        if outcome.is_err() {
            let error = first_error
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .unwrap_or(PlanError::Cancelled);
            return Err(error);
        }

        let mut actions: Vec<Action> = slots.into_iter().flatten().collect();
        let wanted: HashSet<PathBuf> = desired.iter().map(DesiredFile::target_path).collect();
        for (target, entry) in &state.files {
            if !wanted.contains(target) {
                actions.push(Action::Delete {
                    target: target.clone(),
                    prior: entry.clone(),
                });
            }
        }

        let summary = PlanSummary::from_actions(&actions);
        tracing::debug!(jobs = self.jobs, %summary, "plan computed");
        Ok(actions)
    }
}
