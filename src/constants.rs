// src/constants.rs

/// The name of the directory holding resolve records, under the base directory.
pub const RESOLVE_DIR: &str = ".resolve";

/// The sub-namespace of the resolve store holding service records, one
/// directory per tree.
pub const SERVICE_RESOLVE_DIR: &str = "service";

/// The sub-namespace of the resolve store holding tree records.
pub const TREE_RESOLVE_DIR: &str = "tree";

/// The reserved record name under which the master record is stored.
pub const MASTER_RECORD_NAME: &str = "Master";

/// Vertex names that can never be used for a service or tree.
pub const RESERVED_NAMES: &[&str] = &["Master", "service", "service@"];

/// The tree used when none was selected and the master record carries no
/// current tree.
pub const DEFAULT_TREE: &str = "main";

/// File extension of frontend service definition files.
pub const FRONTEND_EXTENSION: &str = "toml";

/// The directory under the live directory holding per-service state records.
pub const STATE_DIR: &str = "state";

/// The directory under the live directory scanned by the supervisor.
pub const SCANDIR: &str = "scandir";

/// The supervisor's per-service control/status directory.
pub const SUPERVISE_DIR: &str = "supervise";

/// The control channel (a FIFO) inside the supervise directory.
pub const CONTROL_FILE: &str = "control";

/// The supervisor's fixed-size status record inside the supervise directory.
pub const STATUS_FILE: &str = "status";

/// The separator between a template name and its instance suffix.
pub const INSTANCE_SEPARATOR: char = '@';

/// The token replaced by the instance name when a template frontend is loaded.
pub const INSTANCE_TOKEN: &str = "@I";

/// Environment variable overriding the base (resolve store) directory.
pub const ENV_BASE_DIR: &str = "MARSHAL_BASE_DIR";

/// Environment variable overriding the live (runtime) directory.
pub const ENV_LIVE_DIR: &str = "MARSHAL_LIVE_DIR";

/// Environment variable overriding the system frontend directory.
pub const ENV_SYSTEM_DIR: &str = "MARSHAL_SYSTEM_DIR";

/// Environment variable selecting the tree to operate on.
pub const ENV_TREE: &str = "MARSHAL_TREE";
