//! Structured logger that also collects per-action results.
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::types::{ActionEntry, ActionStatus, Log};
use super::utils::log_file_path;
use super::{DRY_RUN_TARGET, STAGE_TARGET};
use crate::plan::PlanSummary;

/// Logger used by the CLI.
///
/// Messages go through `tracing`; the subscriber installed by
/// [`init_subscriber`](super::init_subscriber) decides where they land.
#[derive(Debug, Default)]
pub struct Logger {
    actions: Mutex<Vec<ActionEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`; remembers the log file path for the summary.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_path(log_file_path(command))
    }

    /// Logger that reports `log_file` in its summary; `None` for none.
    #[must_use]
    pub fn with_log_path(log_file: Option<PathBuf>) -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// Log file this run writes to, if any.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Snapshot of recorded actions.
    #[must_use]
    pub fn entries(&self) -> Vec<ActionEntry> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of actions recorded as failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(ActionStatus::Failed)
    }

    fn count(&self, status: ActionStatus) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.status == status)
            .count()
    }

    /// Print failures, per-kind totals and the log file location.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            self.info("nothing to do");
            return;
        }

        let mut done = PlanSummary::default();
        let mut skipped = 0usize;
        let mut failed = 0usize;
        for entry in &entries {
            match entry.status {
                ActionStatus::Applied | ActionStatus::DryRun => done.record(entry.kind),
                ActionStatus::Skipped => skipped += 1,
                ActionStatus::Failed => {
                    failed += 1;
                    let reason = entry.message.as_deref().unwrap_or("unknown error");
                    self.error(&format!("{} {}: {reason}", entry.kind, entry.target.display()));
                }
            }
        }

        self.stage("Summary");
        self.info(&format!(
            "{} created, {} updated, {} deleted, \x1b[33m{skipped} skipped\x1b[0m, \x1b[31m{failed} failed\x1b[0m",
            done.create, done.update, done.delete
        ));
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    fn record_action(&self, entry: ActionEntry) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}
