// src/cli/handlers/restart.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::lifecycle};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Restarts supervised services and their dependents."
)]
struct RestartArgs {
    /// The services to restart. Each must already be under supervision.
    #[arg(required = true)]
    services: Vec<String>,

    /// Do not propagate: restart exactly the named services.
    #[arg(long = "no-propagate", short = 'P')]
    no_propagate: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let restart_args = RestartArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    println!("\nRestarting services in tree '{}':", tree.cyan());
    let report = lifecycle::restart(
        ctx,
        &tree,
        &restart_args.services,
        !restart_args.no_propagate,
    )?;
    commons::finish_report(&report)
}
