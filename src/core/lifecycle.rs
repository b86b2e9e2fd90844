// src/core/lifecycle.rs

//! The lifecycle orchestrator.
//!
//! Each public function here drives one user-requested operation across the
//! dependency graph: validate the requested names, build the graph over the
//! relevant scope, compute the visit set in the direction the operation
//! needs, then drive the state file and the external supervisor per vertex
//! in (reverse-)topological order.
//!
//! Failures mid-traversal are collected per vertex and reported at the end;
//! already-completed vertices are never rolled back, because supervision
//! state is not transactional across independent services.

use crate::context::Context;
use crate::core::compiler::{self, CompileError};
use crate::core::graph::{Direction, Graph, GraphError, Vertex, VertexKind};
use crate::core::resolve::{self, ResolveError};
use crate::core::service::{self, ServiceError};
use crate::core::statefile::{self, StateError, StateFlag};
use crate::core::supervisor::{self, SupervisorError};
use crate::models::{ResolveMaster, ResolveTree, ServiceField};
use std::collections::HashSet;
use std::fs;
use thiserror::Error;

/// Represents errors that abort a whole lifecycle operation. Per-vertex
/// trouble is collected in the [`OperationReport`] instead.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    /// An operation that needs a compiled record found none.
    #[error("Service '{name}' is not parsed; run 'marshal parse {name}' first.")]
    NotParsed { name: String },
    /// Restart requested for a service the supervisor does not hold.
    #[error("Service '{name}' is not supervised; start it before requesting a restart.")]
    NotSupervised { name: String },
    /// Removal refused because another service still references the target.
    #[error(
        "Service '{name}' is still required by '{dependent}'; remove the dependent first or propagate."
    )]
    StillRequired { name: String, dependent: String },
}

/// One vertex that could not be processed, with the reason.
#[derive(Debug)]
pub struct VertexFailure {
    pub name: String,
    pub reason: String,
}

/// The outcome of one lifecycle operation over its visit set.
#[derive(Debug)]
pub struct OperationReport {
    pub operation: &'static str,
    /// Vertices processed successfully, in execution order.
    pub processed: Vec<String>,
    /// Vertices that failed, in execution order. Never empties `processed`:
    /// partial application is accepted and surfaced.
    pub failures: Vec<VertexFailure>,
}

impl OperationReport {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            processed: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

type LifecycleResult<T> = Result<T, LifecycleError>;

// --- Graph scope helpers ---

fn record_fetcher<'c>(
    ctx: &'c Context,
    tree: &'c str,
) -> impl FnMut(&str) -> Result<Option<Vertex>, ResolveError> + 'c {
    move |name: &str| {
        Ok(resolve::read_service(ctx, tree, name)?.map(|record| Vertex::from_record(&record)))
    }
}

/// Builds the graph over every record of the tree. Enable/disable/restart
/// sanitation works on this whole-system scope; the display layer renders
/// it.
pub fn tree_graph(ctx: &Context, tree: &str) -> LifecycleResult<Graph> {
    let names = resolve::list_services(ctx, tree)?;
    Ok(Graph::build(&names, record_fetcher(ctx, tree))?)
}

/// Builds the graph incrementally, seeded from just the requested names.
/// Start/stop only ever touch this expanded sub-graph.
fn seeded_graph(ctx: &Context, tree: &str, seeds: &[String]) -> LifecycleResult<Graph> {
    Ok(Graph::build(seeds, record_fetcher(ctx, tree))?)
}

/// Computes the ordered list of vertices an operation must visit.
///
/// With propagation the seeds are expanded along `direction`; without it
/// the operation is restricted to exactly the named vertices. The result
/// follows the graph's topological order, reversed for stop-class
/// operations.
fn visit_order<'g>(
    graph: &'g Graph,
    seeds: &[String],
    direction: Direction,
    propagate: bool,
    reverse: bool,
) -> Result<Vec<&'g Vertex>, GraphError> {
    let selected: Vec<&Vertex> = if propagate {
        graph.compute_visit_set(seeds, direction)?
    } else {
        seeds
            .iter()
            .map(|name| {
                graph.vertex(name).ok_or_else(|| GraphError::Unknown {
                    name: name.clone(),
                })
            })
            .collect::<Result<_, _>>()?
    };
    let names: HashSet<&str> = selected.iter().map(|v| v.name.as_str()).collect();

    let mut ordered: Vec<&Vertex> = graph
        .sorted()?
        .into_iter()
        .filter(|v| names.contains(v.name.as_str()))
        .collect();
    if reverse {
        ordered.reverse();
    }
    Ok(ordered)
}

/// Runs one closure per vertex, collecting failures without aborting the
/// traversal.
fn drive<F>(order: &[&Vertex], report: &mut OperationReport, mut op: F)
where
    F: FnMut(&Vertex) -> LifecycleResult<()>,
{
    for vertex in order {
        match op(vertex) {
            Ok(()) => report.processed.push(vertex.name.clone()),
            Err(e) => {
                log::warn!("{} failed for '{}': {}", report.operation, vertex.name, e);
                report.failures.push(VertexFailure {
                    name: vertex.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

// --- Enable / disable ---

/// Enables the named services, bringing their prerequisites along unless
/// propagation is off, then rewrites the affected records' dependency
/// fields from the graph and registers the tree with the master record.
pub fn enable(
    ctx: &Context,
    tree: &str,
    names: &[String],
    propagate: bool,
) -> LifecycleResult<OperationReport> {
    ensure_parsed(ctx, tree, names)?;
    let graph = tree_graph(ctx, tree)?;
    let order = visit_order(&graph, names, Direction::DependsOn, propagate, false)?;

    let mut report = OperationReport::new("enable");
    drive(&order, &mut report, |vertex| {
        resolve::modify_service_field(ctx, tree, &vertex.name, ServiceField::Enabled, "true")?;
        statefile::set_flag(&ctx.state_path(&vertex.name), StateFlag::ToInit, true)?;
        Ok(())
    });

    sanitize(ctx, tree, &graph)?;
    register_tree(ctx, tree)?;
    Ok(report)
}

/// Disables the named services, taking their dependents down-config first
/// unless propagation is off.
pub fn disable(
    ctx: &Context,
    tree: &str,
    names: &[String],
    propagate: bool,
) -> LifecycleResult<OperationReport> {
    let graph = tree_graph(ctx, tree)?;
    let order = visit_order(&graph, names, Direction::RequiredBy, propagate, true)?;

    let mut report = OperationReport::new("disable");
    drive(&order, &mut report, |vertex| {
        resolve::modify_service_field(ctx, tree, &vertex.name, ServiceField::Enabled, "false")?;
        statefile::set_flag(&ctx.state_path(&vertex.name), StateFlag::ToInit, false)?;
        Ok(())
    });

    sanitize(ctx, tree, &graph)?;
    register_tree(ctx, tree)?;
    Ok(report)
}

/// Parses any requested name that has no record yet. Enable is allowed to
/// trigger the frontend compilation step; the graph build below would
/// otherwise refuse the unknown vertex.
fn ensure_parsed(ctx: &Context, tree: &str, names: &[String]) -> LifecycleResult<()> {
    for name in names {
        if resolve::read_service(ctx, tree, name)?.is_none() {
            log::info!("'{}' has no resolve record yet, parsing its frontend.", name);
            compiler::parse_services(ctx, tree, std::slice::from_ref(name), false)?;
        }
    }
    Ok(())
}

// --- Start / stop / restart ---

/// Starts the named services after their prerequisites, dependency-first.
pub fn start(
    ctx: &Context,
    tree: &str,
    names: &[String],
    propagate: bool,
) -> LifecycleResult<OperationReport> {
    let graph = seeded_graph(ctx, tree, names)?;
    let order = visit_order(&graph, names, Direction::DependsOn, propagate, false)?;

    let mut report = OperationReport::new("start");
    drive(&order, &mut report, |vertex| start_one(ctx, vertex));
    Ok(report)
}

/// Stops the named services after everything that depends on them,
/// dependents-first. With `unsupervise` the services are also removed from
/// supervision entirely.
pub fn stop(
    ctx: &Context,
    tree: &str,
    names: &[String],
    propagate: bool,
    unsupervise: bool,
) -> LifecycleResult<OperationReport> {
    let graph = seeded_graph(ctx, tree, names)?;
    let order = visit_order(&graph, names, Direction::RequiredBy, propagate, true)?;

    let mut report = OperationReport::new("stop");
    drive(&order, &mut report, |vertex| {
        stop_one(ctx, vertex)?;
        if unsupervise {
            unsupervise_one(ctx, vertex)?;
        }
        Ok(())
    });
    Ok(report)
}

/// Restarts the named services and everything that depends on them,
/// dependents-first. A non-supervised service cannot be restarted: that is
/// a user error checked before anything is queued.
pub fn restart(
    ctx: &Context,
    tree: &str,
    names: &[String],
    propagate: bool,
) -> LifecycleResult<OperationReport> {
    let graph = tree_graph(ctx, tree)?;
    for name in names {
        let vertex = graph.vertex(name).ok_or_else(|| GraphError::Unknown {
            name: name.clone(),
        })?;
        if !is_grouping(vertex)
            && !statefile::check_flag(&ctx.state_path(name), StateFlag::IsSupervised)?
        {
            return Err(LifecycleError::NotSupervised { name: name.clone() });
        }
    }

    let order = visit_order(&graph, names, Direction::RequiredBy, propagate, true)?;

    let mut report = OperationReport::new("restart");
    drive(&order, &mut report, |vertex| restart_one(ctx, vertex));
    Ok(report)
}

/// Groupings have no process of their own; they only track logical state.
fn is_grouping(vertex: &Vertex) -> bool {
    matches!(vertex.kind, VertexKind::Bundle | VertexKind::Module)
}

fn start_one(ctx: &Context, vertex: &Vertex) -> LifecycleResult<()> {
    let state_path = ctx.state_path(&vertex.name);
    let mut state = statefile::read(&state_path)?.unwrap_or_default();
    if !state.is_parsed {
        return Err(LifecycleError::NotParsed {
            name: vertex.name.clone(),
        });
    }
    if state.is_up {
        log::debug!("'{}' is already up, nothing to do.", vertex.name);
        return Ok(());
    }

    if !is_grouping(vertex) {
        let live = ctx.service_live_dir(&vertex.name);
        supervisor::send_control(&live, supervisor::CONTROL_UP)?;
        supervisor::wait_status(&live, ctx.timeout, |s| s.is_running)?;
        state.is_supervised = true;
    }
    state.is_up = true;
    state.to_init = false;
    statefile::write(&state_path, &state)?;
    Ok(())
}

fn stop_one(ctx: &Context, vertex: &Vertex) -> LifecycleResult<()> {
    let state_path = ctx.state_path(&vertex.name);
    let mut state = statefile::read(&state_path)?.unwrap_or_default();
    if !state.is_up && !state.is_supervised {
        // Stopping something that was never brought up is a no-op.
        log::debug!("'{}' is not up, nothing to do.", vertex.name);
        return Ok(());
    }

    if !is_grouping(vertex) && state.is_supervised {
        let live = ctx.service_live_dir(&vertex.name);
        supervisor::send_control(&live, supervisor::CONTROL_DOWN)?;
        supervisor::wait_status(&live, ctx.timeout, |s| !s.is_running)?;
    }
    state.is_up = false;
    statefile::write(&state_path, &state)?;
    Ok(())
}

/// The unsupervise routine: flag the request, ask the supervisor to let go
/// of the service, delete the live directory, then rewrite the flags to
/// reflect "down and unsupervised".
fn unsupervise_one(ctx: &Context, vertex: &Vertex) -> LifecycleResult<()> {
    let state_path = ctx.state_path(&vertex.name);
    let mut state = statefile::read(&state_path)?.unwrap_or_default();
    if !state.is_supervised {
        return Ok(());
    }
    state.to_unsupervise = true;
    statefile::write(&state_path, &state)?;

    if !is_grouping(vertex) {
        let live = ctx.service_live_dir(&vertex.name);
        supervisor::send_control(&live, supervisor::CONTROL_EXIT)?;
        fs::remove_dir_all(&live).map_err(ResolveError::Io)?;
    }

    state.to_unsupervise = false;
    state.is_supervised = false;
    state.is_up = false;
    statefile::write(&state_path, &state)?;
    Ok(())
}

fn restart_one(ctx: &Context, vertex: &Vertex) -> LifecycleResult<()> {
    let state_path = ctx.state_path(&vertex.name);
    let mut state = statefile::read(&state_path)?.unwrap_or_default();

    // Groupings never hold a supervised process; they only track logical
    // state, exactly as in start/stop.
    if !is_grouping(vertex) {
        if !state.is_supervised {
            return Err(LifecycleError::NotSupervised {
                name: vertex.name.clone(),
            });
        }
        let live = ctx.service_live_dir(&vertex.name);
        supervisor::send_control(&live, supervisor::CONTROL_RESTART)?;
        supervisor::wait_status(&live, ctx.timeout, |s| s.is_running)?;
    }
    state.is_up = true;
    statefile::write(&state_path, &state)?;
    Ok(())
}

// --- Remove ---

/// Removes services from management entirely: stops and unsupervises what
/// is still running, deletes the resolve and state records, and scrubs the
/// removed names out of every surviving record so later graph builds don't
/// trip over dangling references.
///
/// Without propagation a service some other service still requires cannot
/// be removed; with it, the dependents are removed too, dependents-first.
pub fn remove(
    ctx: &Context,
    tree: &str,
    names: &[String],
    propagate: bool,
) -> LifecycleResult<OperationReport> {
    let graph = tree_graph(ctx, tree)?;

    if !propagate {
        for name in names {
            let dependents = graph.edges_of(name, Direction::RequiredBy, false)?;
            if let Some(dependent) = dependents.iter().find(|d| !names.contains(&d.name)) {
                return Err(LifecycleError::StillRequired {
                    name: name.clone(),
                    dependent: dependent.name.clone(),
                });
            }
        }
    }

    let order = visit_order(&graph, names, Direction::RequiredBy, propagate, true)?;
    let mut report = OperationReport::new("remove");
    drive(&order, &mut report, |vertex| {
        let state_path = ctx.state_path(&vertex.name);
        let state = statefile::read(&state_path)?.unwrap_or_default();
        if state.is_supervised {
            stop_one(ctx, vertex)?;
            unsupervise_one(ctx, vertex)?;
        }
        resolve::remove_service(ctx, tree, &vertex.name)?;
        match fs::remove_file(&state_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ResolveError::Io(e).into()),
        }
        Ok(())
    });

    scrub_references(ctx, tree, &graph, &report.processed)?;
    register_tree(ctx, tree)?;
    Ok(report)
}

/// Drops the removed names from the dependency fields and module contents
/// of every surviving record of the tree.
fn scrub_references(
    ctx: &Context,
    tree: &str,
    graph: &Graph,
    removed: &[String],
) -> LifecycleResult<()> {
    let removed: HashSet<&str> = removed.iter().map(String::as_str).collect();
    for vertex in graph.vertices() {
        if removed.contains(vertex.name.as_str()) {
            continue;
        }
        if let Some(mut record) = resolve::read_service(ctx, tree, &vertex.name)? {
            let before = record.depends_on.len() + record.required_by.len()
                + record.contents.len();
            record.depends_on.retain(|n| !removed.contains(n.as_str()));
            record.required_by.retain(|n| !removed.contains(n.as_str()));
            record.contents.retain(|n| !removed.contains(n.as_str()));
            let after = record.depends_on.len() + record.required_by.len()
                + record.contents.len();
            if after != before {
                log::debug!("Scrubbing removed references out of '{}'.", vertex.name);
                resolve::write_service(ctx, &record)?;
            }
        }
    }
    Ok(())
}

// --- Sanitize / record upkeep ---

/// Rewrites every affected vertex's persisted `depends_on`/`required_by`
/// from the graph's adjacency, never from the stale on-disk value. This is
/// what keeps the two relations transpose-consistent after structural
/// edits: the graph registers every edge in both directions, so both lists
/// come from the same authoritative edge set.
pub fn sanitize(ctx: &Context, tree: &str, graph: &Graph) -> LifecycleResult<()> {
    for vertex in graph.vertices() {
        // Module-membership edges stay out of the persisted lists on both
        // sides; only genuine dependency edges are written back.
        let depends: Vec<String> = graph
            .edges_of(&vertex.name, Direction::DependsOn, false)?
            .iter()
            .filter(|v| !vertex.contents.contains(&v.name))
            .map(|v| v.name.clone())
            .collect();
        let required: Vec<String> = graph
            .edges_of(&vertex.name, Direction::RequiredBy, false)?
            .iter()
            .filter(|v| !v.contents.contains(&vertex.name))
            .map(|v| v.name.clone())
            .collect();

        if let Some(mut record) = resolve::read_service(ctx, tree, &vertex.name)? {
            if record.depends_on != depends || record.required_by != required {
                log::debug!("Sanitizing dependency fields of '{}'.", vertex.name);
                record.depends_on = depends;
                record.required_by = required;
                resolve::write_service(ctx, &record)?;
            }
        }
    }
    Ok(())
}

/// Recomputes the tree record's contents from the store and keeps the
/// master record's tree bookkeeping current.
fn register_tree(ctx: &Context, tree: &str) -> LifecycleResult<()> {
    let mut tree_record =
        resolve::read_tree(ctx, tree)?.unwrap_or_else(|| ResolveTree::new(tree));

    let mut enabled = Vec::new();
    let mut kinds = std::collections::HashMap::new();
    for name in resolve::list_services(ctx, tree)? {
        if let Some(record) = resolve::read_service(ctx, tree, &name)?
            && record.enabled
        {
            kinds.insert(name.clone(), record.kind);
            enabled.push(name);
        }
    }
    // Longrun-backed services come before the groupings that manage them.
    let contents = service::sort_by_type(&enabled, |n| kinds.get(n).copied().flatten());
    tree_record.enabled = !contents.is_empty();
    tree_record.contents = contents;
    resolve::write_tree(ctx, &tree_record)?;

    let mut master = resolve::read_master(ctx)?.unwrap_or_else(ResolveMaster::new);
    if !master.contents.iter().any(|t| t == tree) {
        master.contents.push(tree.to_string());
    }
    if !master.allowed.iter().any(|t| t == tree) {
        master.allowed.push(tree.to_string());
    }
    let listed = master.enabled.iter().any(|t| t == tree);
    if tree_record.enabled && !listed {
        master.enabled.push(tree.to_string());
    } else if !tree_record.enabled && listed {
        master.enabled.retain(|t| t != tree);
    }
    if master.current.is_none() {
        master.current = Some(tree.to_string());
    }
    resolve::write_master(ctx, &master)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths;
    use tempfile::TempDir;

    fn setup(root: &TempDir) -> Context {
        let system = root.path().join("system");
        fs::create_dir_all(&system).unwrap();
        Context::with_roots(root.path(), &root.path().join("live"), &system)
    }

    fn write_frontend(ctx: &Context, name: &str, body: &str) {
        fs::write(ctx.system_dir.join(format!("{name}.toml")), body).unwrap();
    }

    /// The web/db/cache triangle used throughout the examples: web depends
    /// on db and cache, which are both independent.
    fn seed_triangle(ctx: &Context) {
        write_frontend(
            ctx,
            "web",
            "[service]\ntype = \"classic\"\ndepends = [\"db\", \"cache\"]\n",
        );
        write_frontend(ctx, "db", "[service]\ntype = \"classic\"\n");
        write_frontend(ctx, "cache", "[service]\ntype = \"classic\"\n");
        compiler::parse_services(ctx, "main", &["web".to_string()], false).unwrap();
    }

    /// Gives a service a fake live directory whose status file reports the
    /// given liveness tuple.
    fn fake_supervisor(ctx: &Context, name: &str, running: bool) {
        let live = ctx.service_live_dir(name);
        let supervise = paths::supervise_dir(&live);
        fs::create_dir_all(&supervise).unwrap();
        fs::write(supervise.join(crate::constants::CONTROL_FILE), b"").unwrap();
        let mut status = Vec::new();
        for word in [u32::from(running), 0, 0, u32::from(running)] {
            status.extend_from_slice(&word.to_be_bytes());
        }
        fs::write(supervise.join(crate::constants::STATUS_FILE), status).unwrap();
    }

    fn enabled_of(ctx: &Context, name: &str) -> bool {
        resolve::read_service(ctx, "main", name).unwrap().unwrap().enabled
    }

    #[test]
    fn enable_brings_prerequisites_dependency_first() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);

        let report = enable(&ctx, "main", &["web".to_string()], true).unwrap();
        assert!(report.is_ok());
        // The whole-tree graph discovers records in listing order; both
        // prerequisites come before their dependent.
        assert_eq!(report.processed, vec!["cache", "db", "web"]);
        for name in ["web", "db", "cache"] {
            assert!(enabled_of(&ctx, name));
            assert!(
                statefile::check_flag(&ctx.state_path(name), StateFlag::ToInit).unwrap()
            );
        }
    }

    #[test]
    fn enable_without_propagation_touches_only_the_named_vertex() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);

        let report = enable(&ctx, "main", &["web".to_string()], false).unwrap();
        assert_eq!(report.processed, vec!["web"]);
        assert!(enabled_of(&ctx, "web"));
        assert!(!enabled_of(&ctx, "db"));
        assert!(!enabled_of(&ctx, "cache"));
    }

    #[test]
    fn enable_parses_missing_records_first() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        write_frontend(&ctx, "solo", "[service]\ntype = \"classic\"\n");

        // No parse step ran; enable must trigger it.
        let report = enable(&ctx, "main", &["solo".to_string()], true).unwrap();
        assert_eq!(report.processed, vec!["solo"]);
        assert!(enabled_of(&ctx, "solo"));
    }

    #[test]
    fn disable_propagates_to_dependents_in_reverse_order() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        let report = disable(&ctx, "main", &["db".to_string()], true).unwrap();
        // web depends on db, so it goes down-config first; cache is untouched.
        assert_eq!(report.processed, vec!["web", "db"]);
        assert!(!enabled_of(&ctx, "web"));
        assert!(!enabled_of(&ctx, "db"));
        assert!(enabled_of(&ctx, "cache"));
    }

    #[test]
    fn disable_without_propagation_is_a_precision_operation() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        let report = disable(&ctx, "main", &["web".to_string()], false).unwrap();
        assert_eq!(report.processed, vec!["web"]);
        assert!(!enabled_of(&ctx, "web"));
        assert!(enabled_of(&ctx, "db"));
        assert!(enabled_of(&ctx, "cache"));
    }

    #[test]
    fn sanitize_restores_transpose_consistency() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);

        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        // Every V in W.depends_on must list W in its required_by and vice
        // versa, for all vertices of the graph.
        let all = resolve::list_services(&ctx, "main").unwrap();
        for name in &all {
            let record = resolve::read_service(&ctx, "main", name).unwrap().unwrap();
            for dep in &record.depends_on {
                let dep_record = resolve::read_service(&ctx, "main", dep).unwrap().unwrap();
                assert!(
                    dep_record.required_by.contains(name),
                    "{dep} must list {name} as a dependent"
                );
            }
            for dependent in &record.required_by {
                let dependent_record =
                    resolve::read_service(&ctx, "main", dependent).unwrap().unwrap();
                assert!(
                    dependent_record.depends_on.contains(name),
                    "{dependent} must list {name} as a dependency"
                );
            }
        }

        // The derived relation is concrete: db knows web depends on it.
        let db = resolve::read_service(&ctx, "main", "db").unwrap().unwrap();
        assert_eq!(db.required_by, vec!["web"]);
    }

    #[test]
    fn enable_registers_tree_and_master_records() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        let tree = resolve::read_tree(&ctx, "main").unwrap().unwrap();
        assert!(tree.enabled);
        assert_eq!(tree.contents, vec!["cache", "db", "web"]);

        let master = resolve::read_master(&ctx).unwrap().unwrap();
        assert_eq!(master.current.as_deref(), Some("main"));
        assert!(master.enabled.contains(&"main".to_string()));
        assert!(master.allowed.contains(&"main".to_string()));
    }

    #[test]
    fn start_drives_the_visit_set_dependency_first() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();
        for name in ["web", "db", "cache"] {
            fake_supervisor(&ctx, name, true);
        }

        let report = start(&ctx, "main", &["web".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["db", "cache", "web"]);
        for name in ["web", "db", "cache"] {
            let state = statefile::read(&ctx.state_path(name)).unwrap().unwrap();
            assert!(state.is_up);
            assert!(state.is_supervised);
            assert!(!state.to_init);
        }
    }

    #[test]
    fn start_refuses_an_unparsed_service_per_vertex() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        fake_supervisor(&ctx, "db", true);
        // Wipe db's parsed flag to simulate a stale store.
        statefile::set_flag(&ctx.state_path("db"), StateFlag::IsParsed, false).unwrap();

        let report = start(&ctx, "main", &["db".to_string()], true).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.failures[0].name, "db");
        assert!(report.failures[0].reason.contains("not parsed"));
    }

    #[test]
    fn per_vertex_failure_does_not_abort_the_traversal() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();
        // db has no supervision directory at all: malformed.
        fake_supervisor(&ctx, "cache", true);
        fake_supervisor(&ctx, "web", true);

        let report = start(&ctx, "main", &["web".to_string()], true).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "db");
        // The remaining vertices were still driven, in order.
        assert_eq!(report.processed, vec!["cache", "web"]);
    }

    #[test]
    fn stop_takes_dependents_down_first_and_leaves_the_rest() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();
        for name in ["web", "db", "cache"] {
            // Supervisor already reports "down"; the state file still says up.
            fake_supervisor(&ctx, name, false);
            let path = ctx.state_path(name);
            let mut state = statefile::read(&path).unwrap().unwrap();
            state.is_up = true;
            state.is_supervised = true;
            statefile::write(&path, &state).unwrap();
        }

        let report = stop(&ctx, "main", &["db".to_string()], true, false).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["web", "db"]);

        assert!(!statefile::read(&ctx.state_path("web")).unwrap().unwrap().is_up);
        assert!(!statefile::read(&ctx.state_path("db")).unwrap().unwrap().is_up);
        // cache does not depend on db and keeps running.
        assert!(statefile::read(&ctx.state_path("cache")).unwrap().unwrap().is_up);
    }

    #[test]
    fn stop_without_propagation_touches_exactly_the_named_vertices() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();
        for name in ["web", "db"] {
            fake_supervisor(&ctx, name, false);
            let path = ctx.state_path(name);
            let mut state = statefile::read(&path).unwrap().unwrap();
            state.is_up = true;
            state.is_supervised = true;
            statefile::write(&path, &state).unwrap();
        }

        let report = stop(&ctx, "main", &["db".to_string()], false, false).unwrap();
        assert_eq!(report.processed, vec!["db"]);
        assert!(statefile::read(&ctx.state_path("web")).unwrap().unwrap().is_up);
    }

    #[test]
    fn stop_with_unsupervise_removes_the_live_directory() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["db".to_string()], false).unwrap();
        fake_supervisor(&ctx, "db", false);
        let path = ctx.state_path("db");
        let mut state = statefile::read(&path).unwrap().unwrap();
        state.is_up = true;
        state.is_supervised = true;
        statefile::write(&path, &state).unwrap();

        let report = stop(&ctx, "main", &["db".to_string()], false, true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert!(!ctx.service_live_dir("db").exists());

        let state = statefile::read(&path).unwrap().unwrap();
        assert!(!state.is_supervised);
        assert!(!state.is_up);
        assert!(!state.to_unsupervise);
    }

    #[test]
    fn restart_refuses_a_non_supervised_service() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["db".to_string()], false).unwrap();

        let err = restart(&ctx, "main", &["db".to_string()], true).unwrap_err();
        assert!(matches!(err, LifecycleError::NotSupervised { name } if name == "db"));
    }

    #[test]
    fn restart_drives_dependents_too() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();
        for name in ["web", "db", "cache"] {
            fake_supervisor(&ctx, name, true);
            let path = ctx.state_path(name);
            let mut state = statefile::read(&path).unwrap().unwrap();
            state.is_up = true;
            state.is_supervised = true;
            statefile::write(&path, &state).unwrap();
        }

        let report = restart(&ctx, "main", &["db".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        // Dependents are restarted before the service itself; cache is not
        // part of db's dependent closure.
        assert_eq!(report.processed, vec!["web", "db"]);
    }

    #[test]
    fn restart_propagates_through_groupings_without_supervision() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        write_frontend(
            &ctx,
            "webstack",
            "[service]\ntype = \"module\"\ncontents = [\"web\", \"db\"]\n",
        );
        write_frontend(&ctx, "web", "[service]\ntype = \"classic\"\ndepends = [\"db\"]\n");
        write_frontend(&ctx, "db", "[service]\ntype = \"classic\"\n");
        compiler::parse_services(&ctx, "main", &["webstack".to_string()], false).unwrap();
        enable(&ctx, "main", &["webstack".to_string()], true).unwrap();
        for name in ["web", "db"] {
            fake_supervisor(&ctx, name, true);
            let path = ctx.state_path(name);
            let mut state = statefile::read(&path).unwrap().unwrap();
            state.is_up = true;
            state.is_supervised = true;
            statefile::write(&path, &state).unwrap();
        }

        // The module owns db, so it sits in db's dependent closure. It must
        // restart logically, never failing for lack of a supervised process.
        let report = restart(&ctx, "main", &["db".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["webstack", "web", "db"]);

        let state = statefile::read(&ctx.state_path("webstack")).unwrap().unwrap();
        assert!(state.is_up);
        assert!(!state.is_supervised);
    }

    #[test]
    fn restart_on_a_named_bundle_needs_no_supervision() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        write_frontend(
            &ctx,
            "stack",
            "[service]\ntype = \"bundle\"\ndepends = [\"db\"]\n",
        );
        write_frontend(&ctx, "db", "[service]\ntype = \"classic\"\n");
        compiler::parse_services(&ctx, "main", &["stack".to_string()], false).unwrap();
        enable(&ctx, "main", &["stack".to_string()], true).unwrap();

        let report = restart(&ctx, "main", &["stack".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["stack"]);
        assert!(statefile::read(&ctx.state_path("stack")).unwrap().unwrap().is_up);
    }

    #[test]
    fn groupings_track_logical_state_without_a_supervisor() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        write_frontend(
            &ctx,
            "stack",
            "[service]\ntype = \"bundle\"\ndepends = [\"db\"]\n",
        );
        write_frontend(&ctx, "db", "[service]\ntype = \"classic\"\n");
        compiler::parse_services(&ctx, "main", &["stack".to_string()], false).unwrap();
        enable(&ctx, "main", &["stack".to_string()], true).unwrap();
        fake_supervisor(&ctx, "db", true);

        let report = start(&ctx, "main", &["stack".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["db", "stack"]);
        // The bundle never talked to the supervisor but is logically up.
        let state = statefile::read(&ctx.state_path("stack")).unwrap().unwrap();
        assert!(state.is_up);
        assert!(!state.is_supervised);
    }

    #[test]
    fn remove_deletes_records_and_scrubs_references() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        let report = remove(&ctx, "main", &["web".to_string()], false).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["web"]);

        assert!(resolve::read_service(&ctx, "main", "web").unwrap().is_none());
        assert!(!ctx.state_path("web").exists());

        // The survivors no longer reference web, so the tree still builds.
        let db = resolve::read_service(&ctx, "main", "db").unwrap().unwrap();
        assert!(db.required_by.is_empty());
        let graph = tree_graph(&ctx, "main").unwrap();
        assert_eq!(graph.len(), 2);

        let tree_record = resolve::read_tree(&ctx, "main").unwrap().unwrap();
        assert_eq!(tree_record.contents, vec!["cache", "db"]);
    }

    #[test]
    fn remove_without_propagation_refuses_a_required_service() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        let err = remove(&ctx, "main", &["db".to_string()], false).unwrap_err();
        match err {
            LifecycleError::StillRequired { name, dependent } => {
                assert_eq!((name.as_str(), dependent.as_str()), ("db", "web"));
            }
            other => panic!("expected StillRequired, got {other:?}"),
        }
        // Nothing was deleted.
        assert!(resolve::read_service(&ctx, "main", "db").unwrap().is_some());
    }

    #[test]
    fn remove_with_propagation_takes_dependents_along() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        seed_triangle(&ctx);
        enable(&ctx, "main", &["web".to_string()], true).unwrap();

        let report = remove(&ctx, "main", &["db".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["web", "db"]);

        assert!(resolve::read_service(&ctx, "main", "db").unwrap().is_none());
        assert!(resolve::read_service(&ctx, "main", "web").unwrap().is_none());
        // cache never depended on db and survives.
        assert!(resolve::read_service(&ctx, "main", "cache").unwrap().is_some());
    }

    #[test]
    fn module_members_start_before_their_module() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        write_frontend(
            &ctx,
            "webstack",
            "[service]\ntype = \"module\"\ncontents = [\"web\", \"db\"]\n",
        );
        write_frontend(&ctx, "web", "[service]\ntype = \"classic\"\ndepends = [\"db\"]\n");
        write_frontend(&ctx, "db", "[service]\ntype = \"classic\"\n");
        compiler::parse_services(&ctx, "main", &["webstack".to_string()], false).unwrap();
        enable(&ctx, "main", &["webstack".to_string()], true).unwrap();
        for name in ["web", "db"] {
            fake_supervisor(&ctx, name, true);
        }

        let report = start(&ctx, "main", &["webstack".to_string()], true).unwrap();
        assert!(report.is_ok(), "failures: {:?}", report.failures);
        assert_eq!(report.processed, vec!["db", "web", "webstack"]);

        // Membership edges never leak into the persisted dependency lists.
        let record = resolve::read_service(&ctx, "main", "webstack").unwrap().unwrap();
        assert!(record.depends_on.is_empty());
        assert_eq!(record.contents, vec!["web", "db"]);
        let web = resolve::read_service(&ctx, "main", "web").unwrap().unwrap();
        assert_eq!(web.required_by, Vec::<String>::new());
    }

    #[test]
    fn cyclic_records_make_the_whole_operation_fail() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        write_frontend(&ctx, "a", "[service]\ntype = \"classic\"\ndepends = [\"b\"]\n");
        write_frontend(&ctx, "b", "[service]\ntype = \"classic\"\ndepends = [\"a\"]\n");
        compiler::parse_services(&ctx, "main", &["a".to_string()], false).unwrap();

        let err = start(&ctx, "main", &["a".to_string()], true).unwrap_err();
        assert!(matches!(err, LifecycleError::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn operating_on_unknown_names_is_refused() {
        let root = TempDir::new().unwrap();
        let ctx = setup(&root);
        let err = start(&ctx, "main", &["ghost".to_string()], true).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Graph(GraphError::Unknown { .. })
        ));
    }
}
