// src/cli/handlers/commons.rs

// This module contains shared functions used by multiple handlers.

use anyhow::{Result, anyhow};
use colored::Colorize;

use crate::{constants::DEFAULT_TREE, context::Context, core::lifecycle::OperationReport,
    core::resolve};

/// Resolves the tree the invocation targets: an explicit selection wins,
/// else the master record's current tree, else the default tree name.
pub fn current_tree(ctx: &Context) -> Result<String> {
    if let Some(tree) = &ctx.tree {
        return Ok(tree.clone());
    }
    if let Some(master) = resolve::read_master(ctx)?
        && let Some(current) = master.current
    {
        return Ok(current);
    }
    Ok(DEFAULT_TREE.to_string())
}

/// Renders an operation report per vertex and converts any collected
/// failure into an error, so the process exits non-zero whenever a vertex
/// could not be driven.
pub fn finish_report(report: &OperationReport) -> Result<()> {
    for name in &report.processed {
        println!("  {} {}", "ok".green().bold(), name);
    }
    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            "failed".red().bold(),
            failure.name,
            failure.reason
        );
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} failed for {} of {} services.",
            report.operation,
            report.failures.len(),
            report.failures.len() + report.processed.len()
        ))
    }
}
