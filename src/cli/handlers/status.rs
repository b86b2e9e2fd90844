// src/cli/handlers/status.rs

use anyhow::{Context as AnyhowContext, Result, anyhow};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use super::commons;
use crate::{
    context::Context,
    core::{resolve, statefile, supervisor},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Shows the resolve, state, and supervision status of services."
)]
struct StatusArgs {
    /// The services to inspect. Defaults to every service of the tree.
    services: Vec<String>,

    /// Emit machine-readable JSON instead of the table.
    #[arg(long)]
    json: bool,
}

/// The liveness 4-tuple as reported by the supervisor, when reachable.
#[derive(Serialize, Debug)]
struct SupervisorSummary {
    running: bool,
    ready: bool,
    paused: bool,
    wants_up: bool,
}

#[derive(Serialize, Debug)]
struct ServiceStatus {
    name: String,
    kind: String,
    tree: String,
    enabled: bool,
    parsed: bool,
    up: bool,
    supervised: bool,
    supervisor: Option<SupervisorSummary>,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let status_args = StatusArgs::try_parse_from(&args)?;
    let tree = commons::current_tree(ctx)?;

    let names = if status_args.services.is_empty() {
        resolve::list_services(ctx, &tree)?
    } else {
        status_args.services.clone()
    };
    if names.is_empty() {
        return Err(anyhow!("No services matching the requirements."));
    }

    let mut rows = Vec::with_capacity(names.len());
    for name in &names {
        let record = resolve::read_service(ctx, &tree, name)?
            .ok_or_else(|| anyhow!("Service '{}' does not resolve to any known record.", name))?;
        let state = statefile::read(&ctx.state_path(name))?.unwrap_or_default();
        // The supervisor being unreachable is itself status information.
        let supervisor_status =
            supervisor::read_status(Path::new(&record.live_dir))
                .ok()
                .map(|s| SupervisorSummary {
                    running: s.is_running,
                    ready: s.is_ready,
                    paused: s.is_paused,
                    wants_up: s.wants_up,
                });

        rows.push(ServiceStatus {
            name: record.name.clone(),
            kind: record.kind.map(|k| k.to_string()).unwrap_or_default(),
            tree: record.tree.clone(),
            enabled: record.enabled,
            parsed: state.is_parsed,
            up: state.is_up,
            supervised: state.is_supervised,
            supervisor: supervisor_status,
        });
    }

    if status_args.json {
        let output = serde_json::to_string_pretty(&rows)
            .context("Failed to serialize status to JSON.")?;
        println!("{output}");
        return Ok(());
    }

    println!("\nServices in tree '{}':", tree.cyan());
    println!(
        "  {:<20} {:<9} {:<9} {:<8} {:<12} {}",
        "NAME".bold(),
        "KIND".bold(),
        "ENABLED".bold(),
        "PARSED".bold(),
        "SUPERVISED".bold(),
        "STATE".bold()
    );
    for row in &rows {
        let state = if row.up {
            "up".green().to_string()
        } else if row.supervised {
            "down".red().to_string()
        } else {
            "inactive".dimmed().to_string()
        };
        println!(
            "  {:<20} {:<9} {:<9} {:<8} {:<12} {}",
            row.name,
            row.kind,
            row.enabled,
            row.parsed,
            row.supervised,
            state
        );
    }
    Ok(())
}
