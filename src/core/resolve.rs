// src/core/resolve.rs

use crate::constants::MASTER_RECORD_NAME;
use crate::context::Context;
use crate::core::paths;
use crate::models::{
    NameList, ResolveMaster, ResolveService, ResolveTree, SCHEMA_VERSION, ServiceField,
    ServiceKind, TreeField,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Represents errors that can occur during operations on the resolve store.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A filesystem I/O error occurred.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// A record file exists but could not be decoded. A present-but-corrupt
    /// record is an error, unlike a missing one.
    #[error("Resolve record for '{name}' at '{path}' is malformed: {source}")]
    Malformed {
        name: String,
        path: PathBuf,
        #[source]
        source: bincode::error::DecodeError,
    },
    /// An error occurred while serializing a record to binary format.
    #[error("Failed to encode resolve record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    /// A record was written by an incompatible revision of the schema.
    #[error("Resolve record for '{name}' uses schema revision {found}, expected {expected}.")]
    UnsupportedSchema {
        name: String,
        found: u32,
        expected: u32,
    },
    /// A modify operation targeted a record that does not exist.
    #[error("No resolve record found for '{name}'.")]
    Missing { name: String },
    /// A field id outside the schema's table was requested.
    #[error("Unknown field id {id} for the {schema} schema.")]
    UnknownField { id: u8, schema: &'static str },
    /// A field value could not be parsed for the targeted field.
    #[error("Invalid value '{value}' for field '{field}'.")]
    BadFieldValue { field: &'static str, value: String },
    /// The targeted field is derived from the record's location and cannot
    /// be modified in place.
    #[error("Field '{field}' cannot be modified on an existing record.")]
    ImmutableField { field: &'static str },
}

type ResolveResult<T> = Result<T, ResolveError>;

// --- Generic record I/O ---

fn read_record<T: DeserializeOwned>(path: &Path, name: &str) -> ResolveResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        // A missing record is the normal "not yet parsed" condition.
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let (record, _): (T, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(
            |source| ResolveError::Malformed {
                name: name.to_string(),
                path: path.to_path_buf(),
                source,
            },
        )?;
    Ok(Some(record))
}

/// Serializes a record to a temp file in the destination directory, fsyncs,
/// then atomically renames over the destination. A concurrent reader never
/// observes a half-written record.
fn write_record<T: Serialize>(path: &Path, value: &T) -> ResolveResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ResolveError::Io(e.error))?;
    Ok(())
}

/// Unlinks a record. Removing an already-absent record is a no-op.
fn remove_record(path: &Path) -> ResolveResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn check_schema(name: &str, found: u32) -> ResolveResult<()> {
    if found != SCHEMA_VERSION {
        return Err(ResolveError::UnsupportedSchema {
            name: name.to_string(),
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Lists the record names present in a resolve directory, sorted for
/// deterministic iteration. A missing directory is an empty store.
fn list_records(dir: &Path) -> ResolveResult<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            ResolveError::Io(e.into_io_error().unwrap_or_else(|| ErrorKind::Other.into()))
        })?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

// --- Service records ---

pub fn read_service(ctx: &Context, tree: &str, name: &str) -> ResolveResult<Option<ResolveService>> {
    let path = paths::service_record_path(&ctx.base_dir, tree, name);
    let record: Option<ResolveService> = read_record(&path, name)?;
    if let Some(record) = &record {
        check_schema(name, record.schema)?;
    }
    Ok(record)
}

pub fn write_service(ctx: &Context, record: &ResolveService) -> ResolveResult<()> {
    let path = paths::service_record_path(&ctx.base_dir, &record.tree, &record.name);
    log::debug!("Writing service record '{}' to {}", record.name, path.display());
    write_record(&path, record)
}

pub fn remove_service(ctx: &Context, tree: &str, name: &str) -> ResolveResult<()> {
    remove_record(&paths::service_record_path(&ctx.base_dir, tree, name))
}

/// Enumerates every service record of one tree.
pub fn list_services(ctx: &Context, tree: &str) -> ResolveResult<Vec<String>> {
    list_records(&paths::service_resolve_dir(&ctx.base_dir, tree))
}

// --- Tree records ---

pub fn read_tree(ctx: &Context, name: &str) -> ResolveResult<Option<ResolveTree>> {
    let path = paths::tree_record_path(&ctx.base_dir, name);
    let record: Option<ResolveTree> = read_record(&path, name)?;
    if let Some(record) = &record {
        check_schema(name, record.schema)?;
    }
    Ok(record)
}

pub fn write_tree(ctx: &Context, record: &ResolveTree) -> ResolveResult<()> {
    write_record(&paths::tree_record_path(&ctx.base_dir, &record.name), record)
}

pub fn remove_tree(ctx: &Context, name: &str) -> ResolveResult<()> {
    remove_record(&paths::tree_record_path(&ctx.base_dir, name))
}

/// Enumerates every tree record, excluding the master record.
pub fn list_trees(ctx: &Context) -> ResolveResult<Vec<String>> {
    let mut names = list_records(&paths::tree_resolve_dir(&ctx.base_dir))?;
    names.retain(|n| n != MASTER_RECORD_NAME);
    Ok(names)
}

// --- Master record ---

pub fn read_master(ctx: &Context) -> ResolveResult<Option<ResolveMaster>> {
    let path = paths::master_record_path(&ctx.base_dir);
    let record: Option<ResolveMaster> = read_record(&path, MASTER_RECORD_NAME)?;
    if let Some(record) = &record {
        check_schema(MASTER_RECORD_NAME, record.schema)?;
    }
    Ok(record)
}

pub fn write_master(ctx: &Context, record: &ResolveMaster) -> ResolveResult<()> {
    write_record(&paths::master_record_path(&ctx.base_dir), record)
}

// --- Field modification ---

fn parse_bool(field: &'static str, value: &str) -> ResolveResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ResolveError::BadFieldValue {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_names(value: &str) -> Vec<String> {
    NameList::Inline(value.to_string()).clean()
}

fn opt_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn apply_service_field(
    record: &mut ResolveService,
    field: ServiceField,
    value: &str,
) -> ResolveResult<()> {
    match field {
        // The name keys the record file itself.
        ServiceField::Name => return Err(ResolveError::ImmutableField { field: "name" }),
        ServiceField::Description => record.description = opt_string(value),
        ServiceField::Version => record.version = opt_string(value),
        ServiceField::Kind => {
            record.kind = Some(ServiceKind::parse(value).ok_or(ResolveError::BadFieldValue {
                field: "type",
                value: value.to_string(),
            })?);
        }
        ServiceField::Enabled => record.enabled = parse_bool("enabled", value)?,
        ServiceField::Tree => return Err(ResolveError::ImmutableField { field: "tree" }),
        ServiceField::DependsOn => record.depends_on = parse_names(value),
        ServiceField::RequiredBy => record.required_by = parse_names(value),
        ServiceField::Contents => record.contents = parse_names(value),
        ServiceField::FrontendPath => record.frontend_path = value.to_string(),
        ServiceField::LiveDir => record.live_dir = value.to_string(),
        ServiceField::StatePath => record.state_path = value.to_string(),
        ServiceField::FrontendHash => record.frontend_hash = value.to_string(),
    }
    Ok(())
}

/// Read-modify-write shorthand for one field of a service record. The
/// rewritten record goes through the same atomic write path as a full
/// `write_service`.
pub fn modify_service_field(
    ctx: &Context,
    tree: &str,
    name: &str,
    field: ServiceField,
    value: &str,
) -> ResolveResult<()> {
    let mut record = read_service(ctx, tree, name)?.ok_or_else(|| ResolveError::Missing {
        name: name.to_string(),
    })?;
    apply_service_field(&mut record, field, value)?;
    write_service(ctx, &record)
}

fn apply_tree_field(record: &mut ResolveTree, field: TreeField, value: &str) -> ResolveResult<()> {
    match field {
        TreeField::Name => return Err(ResolveError::ImmutableField { field: "name" }),
        TreeField::Enabled => record.enabled = parse_bool("enabled", value)?,
        TreeField::DependsOn => record.depends_on = parse_names(value),
        TreeField::RequiredBy => record.required_by = parse_names(value),
        TreeField::Contents => record.contents = parse_names(value),
    }
    Ok(())
}

/// Read-modify-write shorthand for one field of a tree record.
pub fn modify_tree_field(
    ctx: &Context,
    name: &str,
    field: TreeField,
    value: &str,
) -> ResolveResult<()> {
    let mut record = read_tree(ctx, name)?.ok_or_else(|| ResolveError::Missing {
        name: name.to_string(),
    })?;
    apply_tree_field(&mut record, field, value)?;
    write_tree(ctx, &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_context(root: &TempDir) -> Context {
        Context::with_roots(root.path(), &root.path().join("live"), &root.path().join("sys"))
    }

    fn sample_service() -> ResolveService {
        let mut record = ResolveService::new("httpd", "main");
        record.description = Some("Web server".to_string());
        record.version = Some("2.4".to_string());
        record.kind = Some(ServiceKind::Classic);
        record.enabled = true;
        record.depends_on = vec!["net".to_string()];
        record.required_by = vec!["webstack".to_string()];
        record.frontend_path = "/etc/marshal/service/httpd.toml".to_string();
        record.live_dir = "/run/marshal/scandir/root/httpd".to_string();
        record.state_path = "/run/marshal/state/root/httpd".to_string();
        record.frontend_hash = "d74981efa70a0c880b8d8c1985d075db".to_string();
        record
    }

    #[test]
    fn service_record_round_trips_every_field() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        let record = sample_service();

        write_service(&ctx, &record).unwrap();
        let read_back = read_service(&ctx, "main", "httpd").unwrap().unwrap();
        assert_eq!(read_back, record);
        assert_eq!(read_back.depends_on, vec!["net".to_string()]);
    }

    #[test]
    fn tree_record_round_trips_every_field() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        let mut record = ResolveTree::new("main");
        record.enabled = true;
        record.contents = vec!["httpd".to_string(), "db".to_string()];

        write_tree(&ctx, &record).unwrap();
        assert_eq!(read_tree(&ctx, "main").unwrap().unwrap(), record);
    }

    #[test]
    fn missing_record_is_not_an_error() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        assert!(read_service(&ctx, "main", "ghost").unwrap().is_none());
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        let path = paths::service_record_path(&ctx.base_dir, "main", "broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"\xff\xff\xff\xff not a record").unwrap();

        let err = read_service(&ctx, "main", "broken").unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { .. }));
    }

    #[test]
    fn remove_is_idempotent() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        write_service(&ctx, &sample_service()).unwrap();

        remove_service(&ctx, "main", "httpd").unwrap();
        // Second removal of the now-absent record must also succeed.
        remove_service(&ctx, "main", "httpd").unwrap();
        assert!(read_service(&ctx, "main", "httpd").unwrap().is_none());
    }

    #[test]
    fn modify_field_rewrites_only_the_targeted_field() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        write_service(&ctx, &sample_service()).unwrap();

        modify_service_field(&ctx, "main", "httpd", ServiceField::Enabled, "false").unwrap();
        modify_service_field(&ctx, "main", "httpd", ServiceField::DependsOn, "net dns net")
            .unwrap();

        let record = read_service(&ctx, "main", "httpd").unwrap().unwrap();
        assert!(!record.enabled);
        assert_eq!(record.depends_on, vec!["net".to_string(), "dns".to_string()]);
        // Untouched fields survive the rewrite.
        assert_eq!(record.version.as_deref(), Some("2.4"));
    }

    #[test]
    fn modify_field_on_missing_record_errors() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        let err =
            modify_service_field(&ctx, "main", "ghost", ServiceField::Enabled, "true").unwrap_err();
        assert!(matches!(err, ResolveError::Missing { .. }));
    }

    #[test]
    fn name_and_tree_fields_are_immutable() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        write_service(&ctx, &sample_service()).unwrap();

        let err =
            modify_service_field(&ctx, "main", "httpd", ServiceField::Name, "renamed").unwrap_err();
        assert!(matches!(err, ResolveError::ImmutableField { .. }));
    }

    #[test]
    fn bad_field_values_are_rejected() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        write_service(&ctx, &sample_service()).unwrap();

        let err =
            modify_service_field(&ctx, "main", "httpd", ServiceField::Kind, "daemonish").unwrap_err();
        assert!(matches!(err, ResolveError::BadFieldValue { .. }));
    }

    #[test]
    fn list_services_enumerates_one_tree_sorted() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        for name in ["web", "db", "cache"] {
            write_service(&ctx, &ResolveService::new(name, "main")).unwrap();
        }
        write_service(&ctx, &ResolveService::new("other", "second")).unwrap();

        assert_eq!(list_services(&ctx, "main").unwrap(), vec!["cache", "db", "web"]);
        assert_eq!(list_services(&ctx, "second").unwrap(), vec!["other"]);
        assert!(list_services(&ctx, "empty").unwrap().is_empty());
    }

    #[test]
    fn master_record_round_trips() {
        let root = TempDir::new().unwrap();
        let ctx = test_context(&root);
        assert!(read_master(&ctx).unwrap().is_none());

        let mut master = ResolveMaster::new();
        master.allowed = vec!["main".to_string()];
        master.enabled = vec!["main".to_string()];
        master.current = Some("main".to_string());
        master.contents = vec!["main".to_string()];
        write_master(&ctx, &master).unwrap();

        assert_eq!(read_master(&ctx).unwrap().unwrap(), master);
        // The master record is not reported as a tree.
        assert!(list_trees(&ctx).unwrap().is_empty());
    }
}
