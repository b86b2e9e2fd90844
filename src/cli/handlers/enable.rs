// src/cli/handlers/enable.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::lifecycle};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Enables services, bringing their prerequisites along."
)]
struct EnableArgs {
    /// The services to enable.
    #[arg(required = true)]
    services: Vec<String>,

    /// Do not propagate: touch exactly the named services.
    #[arg(long = "no-propagate", short = 'P')]
    no_propagate: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let enable_args = EnableArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    println!("\nEnabling services in tree '{}':", tree.cyan());
    let report = lifecycle::enable(
        ctx,
        &tree,
        &enable_args.services,
        !enable_args.no_propagate,
    )?;
    commons::finish_report(&report)
}
