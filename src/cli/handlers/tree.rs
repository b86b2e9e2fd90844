// src/cli/handlers/tree.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;
use std::collections::HashMap;

use super::commons;
use crate::{
    context::Context,
    core::{
        graph_display::{self, DisplayOptions},
        lifecycle, resolve, statefile,
    },
    models::ResolveMaster,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Displays the dependency graph of a tree."
)]
struct TreeArgs {
    /// Render the graph beneath this service only. Defaults to every root.
    service: Option<String>,

    /// Show each service's kind.
    #[arg(long, short)]
    kinds: bool,

    /// Show each service's runtime state.
    #[arg(long, short)]
    state: bool,

    /// Show all available information (kinds and state).
    #[arg(long)]
    all: bool,

    /// Limit the depth of the tree display.
    #[arg(long, short)]
    depth: Option<usize>,

    /// List every tree of the store instead of rendering a graph.
    #[arg(long, conflicts_with = "switch")]
    list: bool,

    /// Make this tree the default target of later invocations.
    #[arg(long)]
    switch: Option<String>,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    // 1. Parse this handler's specific arguments.
    let tree_args = TreeArgs::try_parse_from(&args)?;

    if let Some(target) = &tree_args.switch {
        return switch_tree(ctx, target);
    }
    if tree_args.list {
        return list_trees(ctx);
    }

    let tree = commons::current_tree(ctx)?;

    // 2. An empty tree gets a friendly hint rather than a graph error.
    if resolve::list_services(ctx, &tree)?.is_empty() {
        println!(
            "\nTree '{}' holds no services. Use 'marshal parse' to add some.",
            tree.cyan()
        );
        return Ok(());
    }

    // 3. Build the whole-tree graph and collect runtime state per vertex.
    let graph = lifecycle::tree_graph(ctx, &tree)?;
    let mut states = HashMap::new();
    if tree_args.state || tree_args.all {
        for vertex in graph.vertices() {
            if let Some(state) = statefile::read(&ctx.state_path(&vertex.name))? {
                states.insert(vertex.name.clone(), state);
            }
        }
    }

    // 4. Set display options based on flags and delegate the rendering.
    let display_options = DisplayOptions {
        show_kinds: tree_args.kinds || tree_args.all,
        show_state: tree_args.state || tree_args.all,
        max_depth: tree_args.depth,
    };

    println!("\nDependency graph of tree '{}':", tree.cyan());
    graph_display::display_service_graph(
        &graph,
        tree_args.service.as_deref(),
        &display_options,
        &states,
    );
    Ok(())
}

/// Repoints the master record's current tree.
fn switch_tree(ctx: &Context, target: &str) -> Result<()> {
    let mut master = resolve::read_master(ctx)?.unwrap_or_else(ResolveMaster::new);
    if !master.allowed.iter().any(|t| t == target) {
        return Err(anyhow!("Tree '{}' is not registered in this store.", target));
    }
    master.current = Some(target.to_string());
    resolve::write_master(ctx, &master)?;
    println!("Current tree is now '{}'.", target.cyan());
    Ok(())
}

/// Lists every tree of the store with its enabled/current markers.
fn list_trees(ctx: &Context) -> Result<()> {
    let trees = resolve::list_trees(ctx)?;
    if trees.is_empty() {
        println!("\nThis store holds no trees yet. Use 'marshal enable' to create one.");
        return Ok(());
    }
    let master = resolve::read_master(ctx)?.unwrap_or_else(ResolveMaster::new);

    println!("\nTrees of this store:");
    for name in trees {
        let record = resolve::read_tree(ctx, &name)?;
        let services = record.as_ref().map_or(0, |r| r.contents.len());
        let mut markers = Vec::new();
        if master.current.as_deref() == Some(name.as_str()) {
            markers.push("current".cyan().to_string());
        }
        if record.is_some_and(|r| r.enabled) {
            markers.push("enabled".green().to_string());
        }
        println!("  {:<16} {} service(s)  {}", name, services, markers.join(" "));
    }
    Ok(())
}
