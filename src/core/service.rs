// src/core/service.rs

//! Naming and lookup rules of the service metadata model: reserved-name
//! validation, `template@instance` detection, the layered frontend search
//! path, and the by-type ordering some consumers need.

use crate::constants::{FRONTEND_EXTENSION, INSTANCE_SEPARATOR, RESERVED_NAMES};
use crate::context::Context;
use crate::models::ServiceKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The name collides with a name the store reserves for itself.
    #[error("'{name}' is a reserved name and cannot be used for a service or tree.")]
    Reserved { name: String },
    /// The name contains characters that would break record paths.
    #[error("'{name}' is not a valid service name.")]
    Invalid { name: String },
    /// An instance name with an empty suffix after the separator.
    #[error("'{name}' names a template instance but the instance suffix is empty.")]
    EmptyInstance { name: String },
}

/// Validates a vertex name against the naming rules: non-empty, no
/// whitespace or path separators, and none of the reserved names.
pub fn validate_name(raw_name: &str) -> Result<(), ServiceError> {
    let name = raw_name.trim();
    if name.is_empty()
        || name.contains(char::is_whitespace)
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(ServiceError::Invalid {
            name: raw_name.to_string(),
        });
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(ServiceError::Reserved {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Detects the `template@instance` naming convention.
///
/// Returns the length of the template part including the separator, i.e.
/// the offset at which the instance suffix starts, or `None` for a plain
/// service name. An instance name with an empty suffix is invalid.
pub fn instance_check(name: &str) -> Result<Option<usize>, ServiceError> {
    match name.find(INSTANCE_SEPARATOR) {
        None => Ok(None),
        Some(pos) => {
            if pos + 1 == name.len() {
                return Err(ServiceError::EmptyInstance {
                    name: name.to_string(),
                });
            }
            Ok(Some(pos + 1))
        }
    }
}

/// The resolved source of one frontend definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendSource {
    /// The definition file to load.
    pub path: PathBuf,
    /// The instance suffix, when `name` follows the template convention.
    pub instance: Option<String>,
}

/// Resolves the frontend definition file for a service name.
///
/// The resolution order mirrors a layered configuration override scheme
/// (user > admin > system), with an explicitly forced directory winning
/// over everything: the first searched directory containing a matching,
/// non-excluded entry is used. For `template@instance` names the file
/// looked up is the template's (`template@`).
///
/// Returns `None` when no directory holds a matching definition.
pub fn frontend_path(ctx: &Context, name: &str) -> Result<Option<FrontendSource>, ServiceError> {
    validate_name(name)?;
    let instance_at = instance_check(name)?;

    let (file_stem, instance) = match instance_at {
        Some(at) => (&name[..at], Some(name[at..].to_string())),
        None => (name, None),
    };
    let file_name = format!("{}.{}", file_stem, FRONTEND_EXTENSION);
    if ctx.exclude.iter().any(|re| re.is_match(&file_name)) {
        return Ok(None);
    }

    for dir in ctx.frontend_dirs() {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            log::debug!("Frontend for '{}' found at {}", name, candidate.display());
            return Ok(Some(FrontendSource {
                path: candidate,
                instance,
            }));
        }
    }
    Ok(None)
}

/// Stable partition of service names by kind: Classic services first, then
/// Module, then Bundle and Oneshot. Downstream consumers process
/// longrun-backed services before their logical groupings; names within one
/// partition keep their input order.
pub fn sort_by_type<F>(names: &[String], mut kind_of: F) -> Vec<String>
where
    F: FnMut(&str) -> Option<ServiceKind>,
{
    let mut rank = |name: &str| match kind_of(name) {
        Some(ServiceKind::Classic) => 0u8,
        Some(ServiceKind::Module) => 1,
        Some(ServiceKind::Bundle) | Some(ServiceKind::Oneshot) | None => 2,
    };
    let mut ranked: Vec<(u8, &String)> = names.iter().map(|n| (rank(n), n)).collect();
    ranked.sort_by_key(|(r, _)| *r);
    ranked.into_iter().map(|(_, n)| n.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reserved_and_invalid_names_are_rejected() {
        for reserved in ["Master", "service", "service@"] {
            assert!(matches!(
                validate_name(reserved),
                Err(ServiceError::Reserved { .. })
            ));
        }
        for invalid in ["", "   ", "a b", "a/b"] {
            assert!(matches!(
                validate_name(invalid),
                Err(ServiceError::Invalid { .. })
            ));
        }
        assert!(validate_name("httpd").is_ok());
    }

    #[test]
    fn instance_check_detects_templates() {
        assert_eq!(instance_check("httpd").unwrap(), None);
        assert_eq!(instance_check("tty@tty1").unwrap(), Some(4));
        assert!(matches!(
            instance_check("tty@"),
            Err(ServiceError::EmptyInstance { .. })
        ));
    }

    #[test]
    fn frontend_lookup_follows_the_layer_order() {
        let root = TempDir::new().unwrap();
        let system = root.path().join("system");
        let admin = root.path().join("admin");
        fs::create_dir_all(&system).unwrap();
        fs::create_dir_all(&admin).unwrap();
        fs::write(system.join("web.toml"), "[service]\ntype = \"classic\"\n").unwrap();
        fs::write(admin.join("web.toml"), "[service]\ntype = \"classic\"\n").unwrap();

        let mut ctx = Context::with_roots(root.path(), root.path(), &system);
        ctx.admin_dir = admin.clone();

        // The admin layer shadows the system layer.
        let source = frontend_path(&ctx, "web").unwrap().unwrap();
        assert_eq!(source.path, admin.join("web.toml"));

        // A forced directory wins over every layer.
        let forced = root.path().join("forced");
        fs::create_dir_all(&forced).unwrap();
        fs::write(forced.join("web.toml"), "[service]\ntype = \"classic\"\n").unwrap();
        ctx.forced_dir = Some(forced.clone());
        let source = frontend_path(&ctx, "web").unwrap().unwrap();
        assert_eq!(source.path, forced.join("web.toml"));
    }

    #[test]
    fn excluded_entries_are_not_resolved() {
        let root = TempDir::new().unwrap();
        let system = root.path().join("system");
        fs::create_dir_all(&system).unwrap();
        fs::write(system.join("web.toml"), "[service]\ntype = \"classic\"\n").unwrap();

        let mut ctx = Context::with_roots(root.path(), root.path(), &system);
        ctx.exclude = vec![Regex::new("^web").unwrap()];
        assert!(frontend_path(&ctx, "web").unwrap().is_none());
    }

    #[test]
    fn template_instances_resolve_to_the_template_file() {
        let root = TempDir::new().unwrap();
        let system = root.path().join("system");
        fs::create_dir_all(&system).unwrap();
        fs::write(system.join("tty@.toml"), "[service]\ntype = \"classic\"\n").unwrap();

        let ctx = Context::with_roots(root.path(), root.path(), &system);
        let source = frontend_path(&ctx, "tty@tty2").unwrap().unwrap();
        assert_eq!(source.path, system.join("tty@.toml"));
        assert_eq!(source.instance.as_deref(), Some("tty2"));
    }

    #[test]
    fn missing_frontend_resolves_to_none() {
        let root = TempDir::new().unwrap();
        let system = root.path().join("system");
        fs::create_dir_all(&system).unwrap();
        let ctx = Context::with_roots(root.path(), root.path(), &system);
        assert!(frontend_path(&ctx, "ghost").unwrap().is_none());
    }

    #[test]
    fn sort_by_type_is_a_stable_partition() {
        let names: Vec<String> = ["mount", "web", "stack", "db", "group"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let kind_of = |name: &str| match name {
            "web" | "db" => Some(ServiceKind::Classic),
            "group" => Some(ServiceKind::Module),
            "stack" => Some(ServiceKind::Bundle),
            "mount" => Some(ServiceKind::Oneshot),
            _ => None,
        };
        let sorted = sort_by_type(&names, kind_of);
        assert_eq!(sorted, vec!["web", "db", "group", "mount", "stack"]);
    }
}
