// src/cli/handlers/start.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::lifecycle};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Starts services in dependency-first order."
)]
struct StartArgs {
    /// The services to start.
    #[arg(required = true)]
    services: Vec<String>,

    /// Do not propagate: start exactly the named services, assuming their
    /// prerequisites are already up.
    #[arg(long = "no-propagate", short = 'P')]
    no_propagate: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let start_args = StartArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    println!("\nStarting services in tree '{}':", tree.cyan());
    let report = lifecycle::start(ctx, &tree, &start_args.services, !start_args.no_propagate)?;
    commons::finish_report(&report)
}
