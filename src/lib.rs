//! Declarative workspace reconciliation.
//!
//! A workspace describes the files that should exist under the home
//! directory: plain files scanned from a source tree, modules pulled from
//! local directories or remote archives, templates, and `.dotd` fragment
//! directories.  Each run turns that description into a desired file list,
//! diffs it against the live filesystem and the recorded state, and applies
//! the difference.
//!
//! - [`modules`]: source grammar, providers, fetch cache and lockfile
//! - [`source`]: the plugin pipeline producing desired files
//! - [`plan`]: desired files × state → actions
//! - [`apply`]: executing actions and producing the next [`state`]
//! - [`commands`]: subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod apply;
pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod logging;
pub mod modules;
pub mod plan;
pub mod platform;
pub mod source;
pub mod state;
