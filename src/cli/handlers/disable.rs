// src/cli/handlers/disable.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::lifecycle};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Disables services, taking their dependents along."
)]
struct DisableArgs {
    /// The services to disable.
    #[arg(required = true)]
    services: Vec<String>,

    /// Do not propagate: touch exactly the named services.
    #[arg(long = "no-propagate", short = 'P')]
    no_propagate: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let disable_args = DisableArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    println!("\nDisabling services in tree '{}':", tree.cyan());
    let report = lifecycle::disable(
        ctx,
        &tree,
        &disable_args.services,
        !disable_args.no_propagate,
    )?;
    commons::finish_report(&report)
}
