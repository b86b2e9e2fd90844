// src/cli/handlers/parse.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{context::Context, core::compiler};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Compiles frontend definitions into resolve records."
)]
struct ParseArgs {
    /// The services to parse. Their declared dependencies, dependents and
    /// module contents are parsed along with them.
    #[arg(required = true)]
    services: Vec<String>,

    /// Recompile even when the frontend content is unchanged.
    #[arg(long, short)]
    force: bool,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let parse_args = ParseArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    let report = compiler::parse_services(ctx, &tree, &parse_args.services, parse_args.force)?;

    for name in &report.compiled {
        println!("  {} {}", "compiled".green().bold(), name);
    }
    for name in &report.skipped {
        println!("  {} {} (unchanged)", "skipped".dimmed(), name);
    }
    println!(
        "\n{} service(s) compiled into tree '{}'.",
        report.compiled.len(),
        tree.cyan()
    );
    Ok(())
}
