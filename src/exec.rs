//! Process environment contract.
//!
//! The engine never spawns programs itself; it only checks whether the
//! program a shim points at resolves on `PATH` so a missing one can be
//! reported.  [`SystemExecutor`] is the production implementation; tests
//! substitute their own.

/// Abstraction over the host's program lookup.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Whether `program` resolves on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Looks programs up on the real `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
