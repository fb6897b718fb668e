//! Command-line entry point for workspaced.

use anyhow::Result;
use clap::{CommandFactory as _, Parser as _};

use workspaced::cancel::CancelToken;
use workspaced::cli::{Cli, Command};
use workspaced::commands;
use workspaced::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    if let Command::Completions { shell } = args.command {
        clap_complete::generate(shell, &mut Cli::command(), "workspaced", &mut std::io::stdout());
        return Ok(());
    }
    if let Command::Version = args.command {
        commands::version::run();
        return Ok(());
    }

    logging::init_subscriber(args.verbose, args.command.name());
    let log = Logger::new(args.command.name());

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, finishing in-flight work");
        handler_token.cancel();
    })?;

    match args.command {
        Command::Plan => commands::plan::run(&args.global, &log, &cancel),
        Command::Apply => commands::apply::run(&args.global, &log, &cancel),
        Command::Lock => commands::lock::run(&args.global, &log),
        Command::Version | Command::Completions { .. } => Ok(()),
    }
}
