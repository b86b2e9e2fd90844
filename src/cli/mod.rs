// src/cli/mod.rs

use clap::Parser;
use std::path::PathBuf;

pub mod handlers;

/// marshal: a dependency-aware service lifecycle manager.
///
/// Every operation takes explicit service names and drives the dependency
/// graph around them: start-class commands bring prerequisites up first,
/// stop-class commands take dependents down first. `-P` restricts any
/// operation to exactly the named services, with no graph expansion.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The tree to operate on. Defaults to the master record's current tree.
    #[arg(long, short = 'T', global = false)]
    pub tree: Option<String>,

    /// Override the live (runtime) directory.
    #[arg(long, short = 'l')]
    pub live: Option<PathBuf>,

    /// Timeout in seconds for supervisor-facing waits. 0 waits forever.
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Search this directory for frontend definitions before every other
    /// layer.
    #[arg(long, short = 'd')]
    pub frontend: Option<PathBuf>,

    /// Skip frontend entries matching this pattern. May be repeated.
    #[arg(long, short = 'x')]
    pub exclude: Vec<String>,

    /// The subcommand to run.
    pub command: Option<String>,

    /// All remaining arguments, handed to the subcommand's own parser.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
