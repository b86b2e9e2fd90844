// src/cli/handlers/stop.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::lifecycle};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Stops services, dependents first."
)]
struct StopArgs {
    /// The services to stop.
    #[arg(required = true)]
    services: Vec<String>,

    /// Do not propagate: stop exactly the named services even if others
    /// still depend on them.
    #[arg(long = "no-propagate", short = 'P')]
    no_propagate: bool,

    /// Also remove the services from supervision and delete their live
    /// directories.
    #[arg(long, short)]
    unsupervise: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let stop_args = StopArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    println!("\nStopping services in tree '{}':", tree.cyan());
    let report = lifecycle::stop(
        ctx,
        &tree,
        &stop_args.services,
        !stop_args.no_propagate,
        stop_args.unsupervise,
    )?;
    commons::finish_report(&report)
}
