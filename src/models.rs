// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// --- FRONTEND MODELS (What is read from a service definition file) ---

/// The kind of a service, as declared by its frontend file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// A long-running daemon under direct supervision.
    Classic,
    /// A run-once unit with no long-lived process.
    Oneshot,
    /// A logical grouping with no process of its own.
    Bundle,
    /// A grouping that owns and manages the services listed in `contents`.
    Module,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Oneshot => "oneshot",
            Self::Bundle => "bundle",
            Self::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "classic" => Some(Self::Classic),
            "oneshot" => Some(Self::Oneshot),
            "bundle" => Some(Self::Bundle),
            "module" => Some(Self::Module),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list of vertex names. Uses `untagged` for flexible frontend syntax:
/// either a TOML array or a single whitespace/newline-delimited string.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum NameList {
    List(Vec<String>),
    Inline(String),
}

impl Default for NameList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl NameList {
    /// Normalizes the raw list into clean vertex names: inline strings are
    /// split on whitespace, comment entries (starting with `#`) and empty
    /// entries are dropped, and duplicates are removed preserving first
    /// occurrence order.
    pub fn clean(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Inline(s) => s.split_whitespace().collect(),
        };

        let mut seen = std::collections::HashSet::new();
        let mut cleaned = Vec::new();
        for entry in raw {
            let entry = entry.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            if seen.insert(entry.to_string()) {
                cleaned.push(entry.to_string());
            }
        }
        cleaned
    }
}

/// The `[service]` table of a frontend definition file.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FrontendService {
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Services this one depends on. Brought up first by start-class
    /// operations.
    #[serde(default)]
    pub depends: NameList,
    /// The inverse relation, declared from this side: services that should
    /// list this one among their dependencies.
    #[serde(default)]
    pub requiredby: NameList,
    /// For modules and bundles: the services this vertex groups.
    #[serde(default)]
    pub contents: NameList,
}

/// Represents the deserialized structure of a frontend definition file.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FrontendFile {
    pub service: FrontendService,
}

// --- RESOLVE RECORD MODELS (The persisted form of a vertex) ---

/// Schema revision written into every record; bumped when a field is added
/// or its meaning changes.
pub const SCHEMA_VERSION: u32 = 1;

/// The persisted metadata for one service, one record file per name under
/// the owning tree's resolve directory.
///
/// The original store kept a flat string pool with per-field integer
/// offsets; here every field is an owned string and the pool bookkeeping
/// disappears entirely.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveService {
    pub schema: u32,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub kind: Option<ServiceKind>,
    pub enabled: bool,
    /// Name of the owning tree.
    pub tree: String,
    pub depends_on: Vec<String>,
    pub required_by: Vec<String>,
    /// For modules: the owned sub-services.
    pub contents: Vec<String>,
    /// Source frontend definition file this record was compiled from.
    pub frontend_path: String,
    /// The live (runtime) supervision directory for this service.
    pub live_dir: String,
    /// Location of the service's state record.
    pub state_path: String,
    /// Truncated blake3 digest of the frontend file content at compile time.
    pub frontend_hash: String,
}

/// The persisted metadata for one tree.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveTree {
    pub schema: u32,
    pub name: String,
    pub enabled: bool,
    pub depends_on: Vec<String>,
    pub required_by: Vec<String>,
    /// Services enabled inside this tree.
    pub contents: Vec<String>,
}

/// The single master record of a resolve store, persisted under the
/// reserved name `Master` in the tree namespace.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveMaster {
    pub schema: u32,
    /// Trees allowed to exist in this store.
    pub allowed: Vec<String>,
    /// Trees brought up at supervisor startup.
    pub enabled: Vec<String>,
    /// The tree operations target when none is named explicitly.
    pub current: Option<String>,
    /// Every tree known to the store, in creation order.
    pub contents: Vec<String>,
}

// --- FIELD TABLES ---
// Field access from the CLI's generic field-query surface is by small
// integer field-id, dispatched through one table per schema. The tables
// also provide the human-readable names used in error messages.

macro_rules! field_table {
    ($(#[$meta:meta])* $name:ident, $schema:literal, [$(($variant:ident, $fname:literal)),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every field of the schema, in field-id order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The schema this table belongs to, for error messages.
            pub const SCHEMA: &'static str = $schema;

            pub fn id(self) -> u8 {
                self as u8
            }

            pub fn from_id(id: u8) -> Option<Self> {
                Self::ALL.get(id as usize).copied()
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $fname),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().find(|f| f.name() == name).copied()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

field_table!(
    /// Field ids of the Service schema.
    ServiceField,
    "service",
    [
        (Name, "name"),
        (Description, "description"),
        (Version, "version"),
        (Kind, "type"),
        (Enabled, "enabled"),
        (Tree, "tree"),
        (DependsOn, "depends"),
        (RequiredBy, "requiredby"),
        (Contents, "contents"),
        (FrontendPath, "frontend"),
        (LiveDir, "livedir"),
        (StatePath, "state"),
        (FrontendHash, "hash"),
    ]
);

field_table!(
    /// Field ids of the Tree schema.
    TreeField,
    "tree",
    [
        (Name, "name"),
        (Enabled, "enabled"),
        (DependsOn, "depends"),
        (RequiredBy, "requiredby"),
        (Contents, "contents"),
    ]
);

field_table!(
    /// Field ids of the TreeMaster schema.
    MasterField,
    "master",
    [
        (Allowed, "allowed"),
        (Enabled, "enabled"),
        (Current, "current"),
        (Contents, "contents"),
    ]
);

fn join_names(names: &[String]) -> String {
    names.join(" ")
}

impl ResolveService {
    /// Creates a record with the current schema revision.
    pub fn new(name: &str, tree: &str) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            name: name.to_string(),
            tree: tree.to_string(),
            ..Default::default()
        }
    }

    /// Renders one field as a display string. Name lists are rendered in
    /// the delimited text format of the frontend parser.
    pub fn field_value(&self, field: ServiceField) -> String {
        match field {
            ServiceField::Name => self.name.clone(),
            ServiceField::Description => self.description.clone().unwrap_or_default(),
            ServiceField::Version => self.version.clone().unwrap_or_default(),
            ServiceField::Kind => self.kind.map(|k| k.to_string()).unwrap_or_default(),
            ServiceField::Enabled => self.enabled.to_string(),
            ServiceField::Tree => self.tree.clone(),
            ServiceField::DependsOn => join_names(&self.depends_on),
            ServiceField::RequiredBy => join_names(&self.required_by),
            ServiceField::Contents => join_names(&self.contents),
            ServiceField::FrontendPath => self.frontend_path.clone(),
            ServiceField::LiveDir => self.live_dir.clone(),
            ServiceField::StatePath => self.state_path.clone(),
            ServiceField::FrontendHash => self.frontend_hash.clone(),
        }
    }
}

impl ResolveTree {
    pub fn new(name: &str) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn field_value(&self, field: TreeField) -> String {
        match field {
            TreeField::Name => self.name.clone(),
            TreeField::Enabled => self.enabled.to_string(),
            TreeField::DependsOn => join_names(&self.depends_on),
            TreeField::RequiredBy => join_names(&self.required_by),
            TreeField::Contents => join_names(&self.contents),
        }
    }
}

impl ResolveMaster {
    pub fn new() -> Self {
        Self {
            schema: SCHEMA_VERSION,
            ..Default::default()
        }
    }

    pub fn field_value(&self, field: MasterField) -> String {
        match field {
            MasterField::Allowed => join_names(&self.allowed),
            MasterField::Enabled => join_names(&self.enabled),
            MasterField::Current => self.current.clone().unwrap_or_default(),
            MasterField::Contents => join_names(&self.contents),
        }
    }
}
