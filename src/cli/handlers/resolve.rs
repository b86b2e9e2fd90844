// src/cli/handlers/resolve.rs

use anyhow::{Context as AnyhowContext, Result, anyhow};
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{
    constants::MASTER_RECORD_NAME,
    context::Context,
    core::resolve::{self, ResolveError},
    models::{MasterField, ServiceField, TreeField},
};

/// Inspect or edit one resolve record.
#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Inspects or edits the resolve record of a service or tree."
)]
struct ResolveArgs {
    /// The record to inspect.
    name: String,

    /// Target the tree-record namespace (tree records and the master
    /// record) instead of the current tree's services.
    #[arg(long = "tree-record", short = 'r')]
    tree_record: bool,

    /// Print a single field, addressed by numeric id or by name.
    #[arg(long, short)]
    field: Option<String>,

    /// Write this value into the selected field instead of printing it.
    #[arg(long, short, requires = "field")]
    set: Option<String>,
}

pub fn handle(args: Vec<String>, ctx: &Context) -> Result<()> {
    let resolve_args = ResolveArgs::try_parse_from(&args)?;

    if resolve_args.tree_record {
        if resolve_args.name == MASTER_RECORD_NAME {
            return inspect_master(ctx, &resolve_args);
        }
        return inspect_tree(ctx, &resolve_args);
    }
    inspect_service(ctx, &resolve_args)
}

/// Looks up a field of one schema table by numeric id or by name. An
/// unknown field is a user error naming the schema, so typos don't read
/// like missing records.
fn lookup_field<T: Copy>(
    spec: &str,
    schema: &'static str,
    from_id: impl Fn(u8) -> Option<T>,
    from_name: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    if let Ok(id) = spec.parse::<u8>() {
        return from_id(id).ok_or_else(|| ResolveError::UnknownField { id, schema }.into());
    }
    from_name(spec).ok_or_else(|| anyhow!("Unknown field '{}' for the {} schema.", spec, schema))
}

fn print_json<T: serde::Serialize>(record: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(record)
        .context("Failed to serialize the record to JSON.")?;
    println!("{output}");
    Ok(())
}

fn inspect_service(ctx: &Context, args: &ResolveArgs) -> Result<()> {
    let tree = commons::current_tree(ctx)?;
    let record = resolve::read_service(ctx, &tree, &args.name)?.ok_or_else(|| {
        anyhow!(
            "No resolve record found for '{}' in tree '{}'.",
            args.name,
            tree
        )
    })?;

    let Some(spec) = &args.field else {
        println!(
            "\nResolve record of service '{}' in tree '{}':",
            args.name.cyan(),
            tree.cyan()
        );
        return print_json(&record);
    };

    let field = lookup_field(
        spec,
        ServiceField::SCHEMA,
        ServiceField::from_id,
        ServiceField::from_name,
    )?;
    if let Some(value) = &args.set {
        resolve::modify_service_field(ctx, &tree, &args.name, field, value)?;
        println!("  {} {}.{} = '{}'", "set".green().bold(), args.name, field, value);
    } else {
        println!("{}", record.field_value(field));
    }
    Ok(())
}

fn inspect_tree(ctx: &Context, args: &ResolveArgs) -> Result<()> {
    let record = resolve::read_tree(ctx, &args.name)?
        .ok_or_else(|| anyhow!("No resolve record found for tree '{}'.", args.name))?;

    let Some(spec) = &args.field else {
        println!("\nResolve record of tree '{}':", args.name.cyan());
        return print_json(&record);
    };

    let field = lookup_field(
        spec,
        TreeField::SCHEMA,
        TreeField::from_id,
        TreeField::from_name,
    )?;
    if let Some(value) = &args.set {
        resolve::modify_tree_field(ctx, &args.name, field, value)?;
        println!("  {} {}.{} = '{}'", "set".green().bold(), args.name, field, value);
    } else {
        println!("{}", record.field_value(field));
    }
    Ok(())
}

fn inspect_master(ctx: &Context, args: &ResolveArgs) -> Result<()> {
    let record = resolve::read_master(ctx)?
        .ok_or_else(|| anyhow!("This store has no master record yet."))?;

    let Some(spec) = &args.field else {
        println!("\nMaster record of the resolve store:");
        return print_json(&record);
    };

    let field = lookup_field(
        spec,
        MasterField::SCHEMA,
        MasterField::from_id,
        MasterField::from_name,
    )?;
    if args.set.is_some() {
        // The lifecycle layer owns the master record's bookkeeping.
        return Err(anyhow!(
            "Master record fields are maintained by enable/disable and cannot be set directly."
        ));
    }
    println!("{}", record.field_value(field));
    Ok(())
}
