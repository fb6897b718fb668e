//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "workspaced",
    about = "Declarative workspace and dotfile reconciliation",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, env = "WORKSPACED_ROOT")]
    pub root: Option<PathBuf>,

    /// Plan and apply on a single thread
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the actions apply would take
    Plan,
    /// Reconcile targets and persist state
    Apply,
    /// Re-resolve every source and rewrite the lockfile
    Lock,
    /// Print version information
    Version,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Lock => "lock",
            Self::Version => "version",
            Self::Completions { .. } => "completions",
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_dry_run_short() {
        let cli = Cli::parse_from(["workspaced", "-d", "apply"]);
        assert!(cli.global.dry_run);
        assert!(matches!(cli.command, Command::Apply));
    }

    #[test]
    fn flags_after_subcommand() {
        let cli = Cli::parse_from(["workspaced", "plan", "--dry-run", "-v"]);
        assert!(cli.global.dry_run);
        assert!(cli.verbose);
    }

    #[test]
    fn parallel_by_default() {
        let cli = Cli::parse_from(["workspaced", "plan"]);
        assert!(cli.global.parallel);
        let cli = Cli::parse_from(["workspaced", "--no-parallel", "plan"]);
        assert!(!cli.global.parallel);
    }

    #[test]
    fn root_override() {
        let cli = Cli::parse_from(["workspaced", "--root", "/tmp/ws", "lock"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.command.name(), "lock");
    }

    #[test]
    fn completions_take_a_shell() {
        let cli = Cli::parse_from(["workspaced", "completions", "bash"]);
        assert!(matches!(cli.command, Command::Completions { shell: Shell::Bash }));
    }

    #[test]
    fn unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["workspaced", "install"]).is_err());
    }
}
