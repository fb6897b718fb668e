//! Action records and the [`Log`] trait.
use std::path::PathBuf;

use crate::plan::ActionKind;

/// Outcome of one planned action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// The change was written.
    Applied,
    /// Dry run; nothing was written.
    DryRun,
    /// Left alone (live type no longer matches what was recorded).
    Skipped,
    /// The change failed; the previous state entry is kept.
    Failed,
}

/// One action result for the run summary.
#[derive(Debug, Clone)]
pub struct ActionEntry {
    /// Action that was attempted.
    pub kind: ActionKind,
    /// Absolute target path.
    pub target: PathBuf,
    /// How it ended.
    pub status: ActionStatus,
    /// Skip reason or error description.
    pub message: Option<String>,
}

/// Logging backend used by commands and the executor.
///
/// [`Logger`](super::Logger) writes through `tracing`; tests supply their
/// own implementations.
pub trait Log: Send + Sync {
    /// Section header.
    fn stage(&self, msg: &str);
    /// Progress message.
    fn info(&self, msg: &str);
    /// Hidden on the console unless verbose; always in the log file.
    fn debug(&self, msg: &str);
    /// Something the user should look at; the run continues.
    fn warn(&self, msg: &str);
    /// A failure.
    fn error(&self, msg: &str);
    /// A change that would have been made.
    fn dry_run(&self, msg: &str);
    /// Record an action result for the summary.
    fn record_action(&self, entry: ActionEntry);
}
