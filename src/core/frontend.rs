// src/core/frontend.rs

//! Loading of frontend service definition files.
//!
//! A frontend file is the human-authored declarative description of one
//! service, a TOML document with a single `[service]` table. This module is
//! a narrow boundary: the rest of the system only ever sees the fixed
//! attribute schema in [`FrontendService`], never raw TOML.

use crate::constants::INSTANCE_TOKEN;
use crate::models::FrontendFile;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Represents errors that can occur while loading a frontend definition.
#[derive(Error, Debug)]
pub enum FrontendError {
    /// An I/O error occurred while reading the definition file.
    #[error("I/O error while reading frontend file: {0}")]
    Io(#[from] std::io::Error),
    /// The TOML content of the definition is invalid.
    #[error("Failed to parse frontend file at '{path}': {source}")]
    TomlParse {
        /// The path to the file that failed to parse.
        path: PathBuf,
        /// The underlying parsing error from the `toml` crate.
        #[source]
        source: toml::de::Error,
    },
}

/// Reads and deserializes a frontend definition file.
///
/// For an instantiated template (`template@instance`), every occurrence of
/// the instance token in the template body is replaced with the instance
/// suffix before parsing, so a single `template@` file can describe a whole
/// family of services.
pub fn load(path: &Path, instance: Option<&str>) -> Result<FrontendFile, FrontendError> {
    let mut content = fs::read_to_string(path)?;
    if let Some(instance) = instance {
        content = content.replace(INSTANCE_TOKEN, instance);
    }
    toml::from_str(&content).map_err(|source| FrontendError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_frontend(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_a_minimal_definition() {
        let file = write_frontend(
            r#"
            [service]
            type = "classic"
            description = "Web server"
            depends = ["net"]
            "#,
        );
        let frontend = load(file.path(), None).unwrap();
        assert_eq!(frontend.service.kind, ServiceKind::Classic);
        assert_eq!(frontend.service.depends.clean(), vec!["net"]);
        assert!(frontend.service.requiredby.clean().is_empty());
    }

    #[test]
    fn dependency_lists_accept_delimited_strings() {
        let file = write_frontend(
            "[service]\ntype = \"oneshot\"\ndepends = \"mount-fs\nnet #legacy\"\n",
        );
        let frontend = load(file.path(), None).unwrap();
        assert_eq!(frontend.service.depends.clean(), vec!["mount-fs", "net"]);
    }

    #[test]
    fn instance_token_is_substituted_before_parsing() {
        let file = write_frontend(
            r#"
            [service]
            type = "classic"
            description = "tty on @I"
            depends = ["udev-@I"]
            "#,
        );
        let frontend = load(file.path(), Some("tty1")).unwrap();
        assert_eq!(frontend.service.description.as_deref(), Some("tty on tty1"));
        assert_eq!(frontend.service.depends.clean(), vec!["udev-tty1"]);
    }

    #[test]
    fn invalid_toml_reports_the_path() {
        let file = write_frontend("[service\ntype = classic");
        let err = load(file.path(), None).unwrap_err();
        assert!(matches!(err, FrontendError::TomlParse { .. }));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let file = write_frontend("[service]\ntype = \"daemonish\"\n");
        assert!(load(file.path(), None).is_err());
    }
}
