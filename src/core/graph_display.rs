// src/core/graph_display.rs

use crate::core::graph::{Direction, Graph, Vertex};
use crate::core::statefile::StateRecord;
use colored::Colorize;
use std::collections::HashMap;

/// Rendering switches for the dependency tree view.
#[derive(Debug, Default)]
pub struct DisplayOptions {
    /// Show each vertex's kind.
    pub show_kinds: bool,
    /// Show each vertex's runtime state next to its name.
    pub show_state: bool,
    /// Limit the depth of the tree display.
    pub max_depth: Option<usize>,
}

/// Displays an ASCII tree of the dependency graph.
///
/// Without a start vertex, every vertex nothing depends on is a root and
/// the whole graph is rendered beneath them. Children of a vertex are its
/// dependencies, so the tree reads "this needs that".
pub fn display_service_graph(
    graph: &Graph,
    start: Option<&str>,
    options: &DisplayOptions,
    states: &HashMap<String, StateRecord>,
) {
    if graph.is_empty() {
        println!("\nNo services are registered in this tree. Use 'marshal parse' to add some.");
        return;
    }

    if let Some(start_name) = start {
        match graph.vertex(start_name) {
            Some(vertex) => print_node(graph, vertex, "", true, 0, options, states),
            None => println!("\nError: service '{start_name}' was not found in this tree."),
        }
        return;
    }

    // Roots are the vertices without dependents.
    let roots: Vec<&Vertex> = graph
        .vertices()
        .filter(|v| {
            graph
                .edges_of(&v.name, Direction::RequiredBy, false)
                .map(|deps| deps.is_empty())
                .unwrap_or(true)
        })
        .collect();

    for (i, root) in roots.iter().enumerate() {
        let is_last = i == roots.len() - 1;
        print_node(graph, root, "", is_last, 0, options, states);
    }
}

/// Recursive function to print a tree node and its dependencies. The depth
/// counter is all the bookkeeping the indentation needs.
fn print_node(
    graph: &Graph,
    vertex: &Vertex,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &DisplayOptions,
    states: &HashMap<String, StateRecord>,
) {
    if let Some(max) = options.max_depth
        && depth > max
    {
        return;
    }

    let connector = if depth == 0 {
        ""
    } else if is_last {
        "└─"
    } else {
        "├─"
    };

    let mut line = format!("{}{}{}", prefix, connector, vertex.name);
    if options.show_kinds {
        line.push_str(&format!(" [{}]", vertex.kind));
    }
    if !vertex.enabled {
        line.push_str(&format!(" {}", "(disabled)".yellow()));
    }
    if options.show_state {
        let marker = match states.get(&vertex.name) {
            Some(state) if state.is_up => "up".green().to_string(),
            Some(state) if state.is_supervised => "down".red().to_string(),
            _ => "inactive".dimmed().to_string(),
        };
        line.push_str(&format!(" ({marker})"));
    }
    println!("{line}");

    let child_prefix = if depth == 0 {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, if is_last { "   " } else { "│  " })
    };

    let children = graph
        .edges_of(&vertex.name, Direction::DependsOn, false)
        .unwrap_or_default();
    for (i, child) in children.iter().enumerate() {
        let is_last_child = i == children.len() - 1;
        print_node(
            graph,
            child,
            &child_prefix,
            is_last_child,
            depth + 1,
            options,
            states,
        );
    }
}
