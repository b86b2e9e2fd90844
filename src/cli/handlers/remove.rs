// src/cli/handlers/remove.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::lifecycle};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Removes services from management, deleting their records."
)]
struct RemoveArgs {
    /// The services to remove. Running services are stopped and
    /// unsupervised first.
    #[arg(required = true)]
    services: Vec<String>,

    /// Do not propagate: refuse the removal while other services still
    /// depend on the named ones.
    #[arg(long = "no-propagate", short = 'P')]
    no_propagate: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let remove_args = RemoveArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    println!("\nRemoving services from tree '{}':", tree.cyan());
    let report = lifecycle::remove(
        ctx,
        &tree,
        &remove_args.services,
        !remove_args.no_propagate,
    )?;
    commons::finish_report(&report)
}
