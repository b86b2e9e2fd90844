// src/context.rs

use crate::constants::{ENV_BASE_DIR, ENV_LIVE_DIR, ENV_SYSTEM_DIR, ENV_TREE};
use crate::core::paths::{self, PathError};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process-lifetime configuration, built once in the binary and threaded
/// explicitly through every call chain. Nothing in the library reads
/// environment variables or global state after this is constructed.
#[derive(Debug, Clone)]
pub struct Context {
    /// Root of the resolve store.
    pub base_dir: PathBuf,
    /// Runtime root: state records and the supervisor's scan directory.
    pub live_dir: PathBuf,
    /// System-wide frontend definition directory (lowest priority).
    pub system_dir: PathBuf,
    /// Administrator frontend override directory.
    pub admin_dir: PathBuf,
    /// Per-owner frontend directory (highest implicit priority).
    pub user_dir: Option<PathBuf>,
    /// Explicitly forced frontend directory; wins over every other source.
    pub forced_dir: Option<PathBuf>,
    /// The owner name used to key state and scan directories.
    pub owner: String,
    /// Tree selected on the command line or via the environment, if any.
    pub tree: Option<String>,
    /// Deadline for supervisor-facing waits. `None` means no timeout.
    pub timeout: Option<Duration>,
    /// Frontend directory entries matching any of these are ignored.
    pub exclude: Vec<Regex>,
}

impl Context {
    /// Builds the context from the environment, with explicit command-line
    /// values taking precedence over environment variables.
    pub fn from_env(
        tree: Option<String>,
        live: Option<PathBuf>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, PathError> {
        let base_dir = match env::var_os(ENV_BASE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => paths::default_base_dir()?,
        };
        let live_dir = live
            .or_else(|| env::var_os(ENV_LIVE_DIR).map(PathBuf::from))
            .unwrap_or_else(paths::default_live_dir);
        let system_dir = env::var_os(ENV_SYSTEM_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/share/marshal/service"));
        let user_dir = dirs::config_dir().map(|d| d.join("marshal").join("service"));
        let owner = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let tree = tree.or_else(|| env::var(ENV_TREE).ok());

        // 0 seconds on the command line means "wait forever".
        let timeout = timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs);

        Ok(Self {
            base_dir,
            live_dir,
            system_dir,
            admin_dir: PathBuf::from("/etc/marshal/service"),
            user_dir,
            forced_dir: None,
            owner,
            tree,
            timeout,
            exclude: Vec::new(),
        })
    }

    /// Builds a context rooted at explicit directories. Used by tests and by
    /// callers embedding the library.
    pub fn with_roots(base_dir: &Path, live_dir: &Path, system_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            live_dir: live_dir.to_path_buf(),
            system_dir: system_dir.to_path_buf(),
            admin_dir: system_dir.to_path_buf(),
            user_dir: None,
            forced_dir: None,
            owner: "test".to_string(),
            tree: None,
            timeout: Some(Duration::from_secs(1)),
            exclude: Vec::new(),
        }
    }

    /// The state record location of one service.
    pub fn state_path(&self, name: &str) -> PathBuf {
        paths::state_path(&self.live_dir, &self.owner, name)
    }

    /// The live supervision directory of one service.
    pub fn service_live_dir(&self, name: &str) -> PathBuf {
        paths::service_live_dir(&self.live_dir, &self.owner, name)
    }

    /// Frontend search directories in priority order: forced, then the
    /// owner's directory, then the admin directory, then the system
    /// directory. The first directory containing a matching, non-excluded
    /// entry wins.
    pub fn frontend_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = Vec::with_capacity(4);
        if let Some(forced) = &self.forced_dir {
            dirs.push(forced);
        }
        if let Some(user) = &self.user_dir {
            dirs.push(user);
        }
        dirs.push(&self.admin_dir);
        dirs.push(&self.system_dir);
        dirs
    }
}
