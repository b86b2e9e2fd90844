// src/bin/marshal.rs

use anyhow::{Context as AnyhowContext, Result, anyhow};
use clap::Parser;
use colored::Colorize;
use marshal::{
    cli::{Cli, handlers},
    context::Context,
};
use regex::Regex;

// --- Command Definition and Registry ---

/// Defines a subcommand, its aliases, and its handler function. The handler
/// signature is kept consistent across all commands for simplicity in the
/// registry.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &Context) -> Result<()>,
}

/// The single source of truth for all subcommands. To add a new command,
/// add a new entry to this static array.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "parse",
        aliases: &[],
        handler: handlers::parse::handle,
    },
    CommandDefinition {
        name: "enable",
        aliases: &[],
        handler: handlers::enable::handle,
    },
    CommandDefinition {
        name: "disable",
        aliases: &[],
        handler: handlers::disable::handle,
    },
    CommandDefinition {
        name: "start",
        aliases: &[],
        handler: handlers::start::handle,
    },
    CommandDefinition {
        name: "stop",
        aliases: &[],
        handler: handlers::stop::handle,
    },
    CommandDefinition {
        name: "restart",
        aliases: &[],
        handler: handlers::restart::handle,
    },
    CommandDefinition {
        name: "tree",
        aliases: &["ls"],
        handler: handlers::tree::handle,
    },
    CommandDefinition {
        name: "status",
        aliases: &["st"],
        handler: handlers::status::handle,
    },
    CommandDefinition {
        name: "resolve",
        aliases: &[],
        handler: handlers::resolve::handle,
    },
    CommandDefinition {
        name: "remove",
        aliases: &["rm"],
        handler: handlers::remove::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// The main entry point of the `marshal` application. It sets up logging,
/// parses arguments, dispatches to the correct handler, and performs
/// centralized error handling.
fn main() {
    env_logger::init();

    // The entire application logic is wrapped in a Result to enable
    // centralized error handling: the decision to terminate the process is
    // made exactly once, here.
    if let Err(e) = run_cli(Cli::parse()) {
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// The main application dispatcher: builds the read-only context from
/// environment and global flags, then routes to the requested handler.
fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut ctx = Context::from_env(cli.tree, cli.live, cli.timeout)?;
    ctx.forced_dir = cli.frontend;
    for pattern in &cli.exclude {
        ctx.exclude.push(
            Regex::new(pattern)
                .with_context(|| format!("Invalid exclude pattern '{pattern}'."))?,
        );
    }

    let Some(action) = cli.command else {
        print_command_list();
        return Ok(());
    };

    match find_command(&action) {
        Some(command) => (command.handler)(cli.args, &ctx),
        None => Err(anyhow!(
            "Unknown command '{}'. Run 'marshal' for the command list.",
            action
        )),
    }
}

fn print_command_list() {
    println!("marshal: a dependency-aware service lifecycle manager.");
    println!("\nCommands:");
    for command in COMMAND_REGISTRY {
        if command.aliases.is_empty() {
            println!("  {}", command.name);
        } else {
            println!("  {} ({})", command.name, command.aliases.join(", "));
        }
    }
    println!("\nRun 'marshal <command> --help' for the flags of one command.");
}
