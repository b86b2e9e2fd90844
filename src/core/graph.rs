// src/core/graph.rs

//! The service dependency graph engine.
//!
//! Builds a directed graph of named vertices from the dependency fields of a
//! selected set of resolve records, detects cycles, computes a topological
//! order, and answers the traversal queries the lifecycle layer needs:
//! direct/transitive edges in either direction, and the full visit set for
//! an operation seeded at one or more vertices.
//!
//! The graph is transient: it is rebuilt from the resolve store on every
//! invocation and never persisted.

use crate::core::resolve::ResolveError;
use crate::models::{ResolveService, ServiceKind};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;

/// Represents errors produced while building or querying the graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A dependency chain closed a cycle. Reported with the edge that
    /// closed it; a cycle is fatal and never silently broken.
    #[error("Cyclic dependency detected: edge '{from}' -> '{to}' closes a cycle.")]
    Cycle { from: String, to: String },
    /// A name did not resolve to any vertex of the graph or any record of
    /// the store.
    #[error("Service '{name}' does not resolve to any known record.")]
    Unknown { name: String },
    /// A selection expanded to an empty vertex set. The engine refuses to
    /// proceed rather than guess intent.
    #[error("No services matching the requirements.")]
    NoMatches,
    /// Reading a record while building the graph failed; the graph would be
    /// computed from incomplete data, so this is fatal for the build.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Direction of a traversal query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow forward edges: what a vertex depends on.
    DependsOn,
    /// Follow reverse edges: what depends on a vertex.
    RequiredBy,
}

/// The kind of a graph vertex. Services carry their frontend kind; trees
/// are vertices of their own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    Classic,
    Oneshot,
    Bundle,
    Module,
    Tree,
}

impl From<ServiceKind> for VertexKind {
    fn from(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Classic => Self::Classic,
            ServiceKind::Oneshot => Self::Oneshot,
            ServiceKind::Bundle => Self::Bundle,
            ServiceKind::Module => Self::Module,
        }
    }
}

impl VertexKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Oneshot => "oneshot",
            Self::Bundle => "bundle",
            Self::Module => "module",
            Self::Tree => "tree",
        }
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named node of the dependency graph.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub name: String,
    pub kind: VertexKind,
    pub enabled: bool,
    pub tree: String,
    pub depends_on: Vec<String>,
    pub required_by: Vec<String>,
    /// For modules: the owned member services. Members are reached and
    /// ordered like dependencies, but they stay out of the persisted
    /// `depends_on` list.
    pub contents: Vec<String>,
}

impl Vertex {
    /// Builds a vertex from a persisted service record.
    pub fn from_record(record: &ResolveService) -> Self {
        Self {
            name: record.name.clone(),
            kind: record.kind.map_or(VertexKind::Classic, VertexKind::from),
            enabled: record.enabled,
            tree: record.tree.clone(),
            depends_on: record.depends_on.clone(),
            required_by: record.required_by.clone(),
            contents: record.contents.clone(),
        }
    }
}

/// Vertex marking used during cycle detection and topological sort,
/// discarded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// The directed dependency graph. Vertices keep insertion (discovery)
/// order; ties between independent vertices are broken by that order, so
/// the same input record set always produces the same output.
#[derive(Debug, Default)]
pub struct Graph {
    vertices: Vec<Vertex>,
    index: HashMap<String, usize>,
    /// Forward adjacency: `forward[v]` lists what `v` depends on.
    forward: Vec<Vec<usize>>,
    /// Reverse adjacency: `reverse[v]` lists what depends on `v`.
    reverse: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn vertex(&self, name: &str) -> Option<&Vertex> {
        self.index.get(name).map(|&idx| &self.vertices[idx])
    }

    /// Iterates vertices in discovery order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    /// Inserts a vertex. Re-adding an existing name is an idempotent no-op
    /// returning the existing slot.
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        if let Some(&idx) = self.index.get(&vertex.name) {
            return idx;
        }
        let idx = self.vertices.len();
        self.index.insert(vertex.name.clone(), idx);
        self.vertices.push(vertex);
        self.forward.push(Vec::new());
        self.reverse.push(Vec::new());
        idx
    }

    /// Registers the edge `from depends-on to` in the forward and reverse
    /// adjacency simultaneously, so both "who does X depend on" and "who
    /// depends on X" are answered without rescanning. Duplicate edges are
    /// ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        if !self.forward[from_idx].contains(&to_idx) {
            self.forward[from_idx].push(to_idx);
            self.reverse[to_idx].push(from_idx);
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, GraphError> {
        self.index.get(name).copied().ok_or_else(|| GraphError::Unknown {
            name: name.to_string(),
        })
    }

    fn adjacency(&self, direction: Direction) -> &[Vec<usize>] {
        match direction {
            Direction::DependsOn => &self.forward,
            Direction::RequiredBy => &self.reverse,
        }
    }

    /// Builds a graph from one or more seed names, expanding through the
    /// record fetcher until the vertex set is closed under both dependency
    /// relations. The expansion is a worklist fixpoint, not a single pass:
    /// dependencies can introduce new vertices transitively.
    ///
    /// The built graph is checked for cycles before being returned; a
    /// cyclic input never yields a partially usable graph.
    pub fn build<F>(seeds: &[String], mut fetch: F) -> Result<Self, GraphError>
    where
        F: FnMut(&str) -> Result<Option<Vertex>, ResolveError>,
    {
        let mut graph = Self::new();
        for seed in seeds {
            graph.expand(seed, &mut fetch)?;
        }
        if graph.is_empty() {
            return Err(GraphError::NoMatches);
        }
        graph.register_edges()?;
        // Full cycle detection; the computed order is discarded here and
        // recomputed on demand by the callers that need it.
        graph.topological_order()?;
        Ok(graph)
    }

    /// Worklist expansion from one seed. Entries reached along the
    /// dependency direction carry a marker so the direct-cycle check below
    /// only fires on genuine dependency chains back to the seed.
    fn expand<F>(&mut self, main: &str, fetch: &mut F) -> Result<(), GraphError>
    where
        F: FnMut(&str) -> Result<Option<Vertex>, ResolveError>,
    {
        let mut pending: VecDeque<(String, bool)> = VecDeque::new();
        pending.push_back((main.to_string(), true));

        while let Some((name, via_depends)) = pending.pop_front() {
            if self.contains(&name) {
                continue;
            }
            let vertex = fetch(&name)?.ok_or_else(|| GraphError::Unknown {
                name: name.clone(),
            })?;

            for dep in &vertex.depends_on {
                // A vertex depending on itself is the smallest possible
                // cycle; catch it before the full sort runs.
                if dep == &vertex.name {
                    return Err(GraphError::Cycle {
                        from: vertex.name.clone(),
                        to: dep.clone(),
                    });
                }
                // A dependency chain leading straight back to the service
                // currently being resolved is the most common user mistake,
                // and cheap to flag during expansion.
                if via_depends && dep == main && vertex.name != main {
                    return Err(GraphError::Cycle {
                        from: vertex.name.clone(),
                        to: main.to_string(),
                    });
                }
                pending.push_back((dep.clone(), via_depends));
            }
            for req in &vertex.required_by {
                pending.push_back((req.clone(), false));
            }
            // A module owns its members; they are expanded like
            // dependencies so the module comes up after them.
            for member in &vertex.contents {
                pending.push_back((member.clone(), via_depends));
            }
            self.add_vertex(vertex);
        }
        Ok(())
    }

    /// Registers every edge declared by the vertices. Both declared
    /// directions feed the same edge set: `A depends-on B` and
    /// `B required-by A` produce the identical `A -> B` edge.
    fn register_edges(&mut self) -> Result<(), GraphError> {
        for idx in 0..self.vertices.len() {
            let name = self.vertices[idx].name.clone();
            let depends = self.vertices[idx].depends_on.clone();
            let required = self.vertices[idx].required_by.clone();
            let contents = self.vertices[idx].contents.clone();
            for dep in depends {
                self.add_edge(&name, &dep)?;
            }
            for req in required {
                self.add_edge(&req, &name)?;
            }
            for member in contents {
                self.add_edge(&name, &member)?;
            }
        }
        Ok(())
    }

    fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let mut colors = vec![Color::White; self.vertices.len()];
        let mut order = Vec::with_capacity(self.vertices.len());
        for idx in 0..self.vertices.len() {
            if colors[idx] == Color::White {
                self.visit(idx, &mut colors, &mut order)?;
            }
        }
        Ok(order)
    }

    /// Three-color depth-first visit. Children are fully processed and
    /// pushed before their parent, so the output is already in
    /// "dependencies before dependents" order with no reversal step.
    fn visit(
        &self,
        idx: usize,
        colors: &mut [Color],
        order: &mut Vec<usize>,
    ) -> Result<(), GraphError> {
        colors[idx] = Color::Gray;
        for &next in &self.forward[idx] {
            match colors[next] {
                // An edge back into the gray path is a cycle.
                Color::Gray => {
                    return Err(GraphError::Cycle {
                        from: self.vertices[idx].name.clone(),
                        to: self.vertices[next].name.clone(),
                    });
                }
                Color::White => self.visit(next, colors, order)?,
                Color::Black => {}
            }
        }
        colors[idx] = Color::Black;
        order.push(idx);
        Ok(())
    }

    /// The topological order of the whole graph: every dependency strictly
    /// precedes its dependents.
    pub fn sorted(&self) -> Result<Vec<&Vertex>, GraphError> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|idx| &self.vertices[idx])
            .collect())
    }

    /// The edges of one vertex along `direction`. With `transitive` the
    /// full reachable set is returned (repeated expansion with a visited
    /// set, not a sort), excluding the vertex itself.
    pub fn edges_of(
        &self,
        name: &str,
        direction: Direction,
        transitive: bool,
    ) -> Result<Vec<&Vertex>, GraphError> {
        let start = self.index_of(name)?;
        let adjacency = self.adjacency(direction);

        if !transitive {
            return Ok(adjacency[start].iter().map(|&i| &self.vertices[i]).collect());
        }

        let mut visited = vec![false; self.vertices.len()];
        visited[start] = true;
        let mut order = Vec::new();
        let mut queue: VecDeque<usize> = adjacency[start].iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            order.push(idx);
            queue.extend(adjacency[idx].iter().copied());
        }
        Ok(order.into_iter().map(|idx| &self.vertices[idx]).collect())
    }

    /// Expands one or more seed vertices along `direction` into the full
    /// ordered set of vertices an operation must touch. Seeds are included;
    /// no vertex appears twice. The visited flags are sized to the graph,
    /// so expansion is linear in edges.
    pub fn compute_visit_set(
        &self,
        seeds: &[String],
        direction: Direction,
    ) -> Result<Vec<&Vertex>, GraphError> {
        let adjacency = self.adjacency(direction);
        let mut visited = vec![false; self.vertices.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        for seed in seeds {
            queue.push_back(self.index_of(seed)?);
        }
        while let Some(idx) = queue.pop_front() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            order.push(idx);
            queue.extend(adjacency[idx].iter().copied());
        }
        if order.is_empty() {
            return Err(GraphError::NoMatches);
        }
        Ok(order.into_iter().map(|idx| &self.vertices[idx]).collect())
    }
}
