// src/core/paths.rs

use crate::constants::{
    MASTER_RECORD_NAME, RESOLVE_DIR, SCANDIR, SERVICE_RESOLVE_DIR, STATE_DIR, SUPERVISE_DIR,
    TREE_RESOLVE_DIR,
};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref MARSHAL_BASE_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the default base directory (`~/.config/marshal`), creating it on
/// first use.
///
/// This function is memoized: the first call computes and caches the path,
/// subsequent calls return the cached value instantly.
pub fn default_base_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = MARSHAL_BASE_DIR.lock().unwrap();

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let base_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join("marshal");

    if !base_path.exists() {
        fs::create_dir_all(&base_path).map_err(|e| PathError::DirCreation {
            path: base_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(base_path.clone());

    Ok(base_path)
}

/// Returns the default live (runtime) directory: the XDG runtime directory
/// when available, `/run/marshal` otherwise.
pub fn default_live_dir() -> PathBuf {
    dirs::runtime_dir()
        .map(|d| d.join("marshal"))
        .unwrap_or_else(|| PathBuf::from("/run/marshal"))
}

/// The resolve directory holding service records for one tree.
pub fn service_resolve_dir(base: &Path, tree: &str) -> PathBuf {
    base.join(RESOLVE_DIR).join(SERVICE_RESOLVE_DIR).join(tree)
}

/// The record file for one service under its owning tree.
pub fn service_record_path(base: &Path, tree: &str, name: &str) -> PathBuf {
    service_resolve_dir(base, tree).join(name)
}

/// The resolve directory holding tree records (and the master record).
pub fn tree_resolve_dir(base: &Path) -> PathBuf {
    base.join(RESOLVE_DIR).join(TREE_RESOLVE_DIR)
}

/// The record file for one tree.
pub fn tree_record_path(base: &Path, name: &str) -> PathBuf {
    tree_resolve_dir(base).join(name)
}

/// The master record of the store, stored under the reserved `Master` name
/// in the tree namespace.
pub fn master_record_path(base: &Path) -> PathBuf {
    tree_record_path(base, MASTER_RECORD_NAME)
}

/// The directory holding state records for one owner.
pub fn state_dir(live: &Path, owner: &str) -> PathBuf {
    live.join(STATE_DIR).join(owner)
}

/// The state record of one service.
pub fn state_path(live: &Path, owner: &str, name: &str) -> PathBuf {
    state_dir(live, owner).join(name)
}

/// The scan directory the supervisor watches for one owner.
pub fn scandir(live: &Path, owner: &str) -> PathBuf {
    live.join(SCANDIR).join(owner)
}

/// The live supervision directory of one service.
pub fn service_live_dir(live: &Path, owner: &str, name: &str) -> PathBuf {
    scandir(live, owner).join(name)
}

/// The supervise directory (control channel + status record) of a live
/// service directory.
pub fn supervise_dir(service_dir: &Path) -> PathBuf {
    service_dir.join(SUPERVISE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_paths_are_namespaced_by_kind_and_tree() {
        let base = Path::new("/var/lib/marshal");
        assert_eq!(
            service_record_path(base, "main", "web"),
            PathBuf::from("/var/lib/marshal/.resolve/service/main/web")
        );
        assert_eq!(
            tree_record_path(base, "main"),
            PathBuf::from("/var/lib/marshal/.resolve/tree/main")
        );
        assert_eq!(
            master_record_path(base),
            PathBuf::from("/var/lib/marshal/.resolve/tree/Master")
        );
    }

    #[test]
    fn state_and_live_paths_are_keyed_by_owner() {
        let live = Path::new("/run/marshal");
        assert_eq!(
            state_path(live, "root", "web"),
            PathBuf::from("/run/marshal/state/root/web")
        );
        assert_eq!(
            service_live_dir(live, "root", "web"),
            PathBuf::from("/run/marshal/scandir/root/web")
        );
    }
}
