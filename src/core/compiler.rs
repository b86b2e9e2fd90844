// src/core/compiler.rs

//! # Compiler
//!
//! Turns human-authored frontend definitions into persisted resolve
//! records: the `parse` operation. Parsing one service pulls in its
//! declared dependencies, dependents, and (for modules) its contents, so a
//! single invocation leaves the store closed over everything the graph
//! engine will later need.

use crate::context::Context;
use crate::core::frontend::{self, FrontendError};
use crate::core::resolve::{self, ResolveError};
use crate::core::service::{self, FrontendSource, ServiceError};
use crate::core::statefile::{self, StateError};
use crate::models::{FrontendService, ResolveService, SCHEMA_VERSION};
use std::collections::{HashSet, VecDeque};
use std::fs;
use thiserror::Error;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Represents errors that can occur while compiling frontend definitions.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Frontend(#[from] FrontendError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// No searched directory holds a definition for the name.
    #[error("No frontend definition found for '{name}'.")]
    NotFound { name: String },
}

/// What one `parse` invocation did, per service.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Services whose records were (re)compiled.
    pub compiled: Vec<String>,
    /// Services whose definitions were unchanged and skipped.
    pub skipped: Vec<String>,
}

/// The truncated blake3 digest stored in resolve records to detect frontend
/// changes between invocations.
pub fn content_hash(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    hex::encode(&hash.as_bytes()[..HASH_TRUNCATE_LENGTH])
}

/// Compiles the named services (and, transitively, every service they
/// reference) into resolve records under `tree`.
///
/// A service whose frontend content hash matches its existing record is
/// skipped unless `force` is set; its references are still followed so the
/// store stays closed under the dependency relations.
pub fn parse_services(
    ctx: &Context,
    tree: &str,
    names: &[String],
    force: bool,
) -> Result<CompileReport, CompileError> {
    let mut report = CompileReport::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut pending: VecDeque<String> = names.iter().cloned().collect();

    while let Some(name) = pending.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        service::validate_name(&name)?;

        let existing = resolve::read_service(ctx, tree, &name)?;
        let source = service::frontend_path(ctx, &name)?;

        let source = match source {
            Some(source) => source,
            None => {
                // A record without a frontend can still feed the graph; a
                // name with neither is unresolvable.
                if let Some(record) = existing {
                    queue_references(&mut pending, &record);
                    report.skipped.push(name);
                    continue;
                }
                return Err(CompileError::NotFound { name });
            }
        };

        let content = fs::read(&source.path)?;
        let hash = content_hash(&content);

        if let Some(record) = &existing
            && record.frontend_hash == hash
            && !force
        {
            log::debug!("Frontend for '{}' unchanged, skipping compilation.", name);
            queue_references(&mut pending, record);
            report.skipped.push(name);
            continue;
        }

        let loaded = frontend::load(&source.path, source.instance.as_deref())?;
        let record = build_record(ctx, tree, &name, &loaded.service, &source, hash, &existing);
        resolve::write_service(ctx, &record)?;
        mark_parsed(ctx, &name)?;
        log::info!("Compiled resolve record for '{}' in tree '{}'.", name, tree);

        queue_references(&mut pending, &record);
        report.compiled.push(name);
    }

    Ok(report)
}

/// Follows every name a record references so the worklist reaches the
/// fixpoint: dependencies, dependents, and module contents.
fn queue_references(pending: &mut VecDeque<String>, record: &ResolveService) {
    pending.extend(record.depends_on.iter().cloned());
    pending.extend(record.required_by.iter().cloned());
    pending.extend(record.contents.iter().cloned());
}

fn build_record(
    ctx: &Context,
    tree: &str,
    name: &str,
    frontend: &FrontendService,
    source: &FrontendSource,
    hash: String,
    existing: &Option<ResolveService>,
) -> ResolveService {
    ResolveService {
        schema: SCHEMA_VERSION,
        name: name.to_string(),
        description: frontend.description.clone(),
        version: frontend.version.clone(),
        kind: Some(frontend.kind),
        // Re-parsing a definition must not flip the administrative state.
        enabled: existing.as_ref().is_some_and(|r| r.enabled),
        tree: tree.to_string(),
        depends_on: frontend.depends.clean(),
        required_by: frontend.requiredby.clean(),
        contents: frontend.contents.clean(),
        frontend_path: source.path.display().to_string(),
        live_dir: ctx.service_live_dir(name).display().to_string(),
        state_path: ctx.state_path(name).display().to_string(),
        frontend_hash: hash,
    }
}

fn mark_parsed(ctx: &Context, name: &str) -> Result<(), StateError> {
    let path = ctx.state_path(name);
    let mut state = statefile::read(&path)?.unwrap_or_default();
    state.is_parsed = true;
    state.to_parse = false;
    statefile::write(&path, &state)
}
