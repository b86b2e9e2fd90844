// src/core/statefile.rs

//! The per-service state record: a fixed 32-byte binary file holding the
//! runtime flags of one service, independent of the resolve record so that
//! transient supervision status survives without touching the persisted
//! configuration.
//!
//! The layout (8 fields of 4 bytes each, big-endian) is a wire format: the
//! supervisor's own tooling inspects these files, so the packing is stable
//! within one schema revision and deliberately not serde.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Size in bytes of a packed state record.
pub const STATE_RECORD_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("State record at '{path}' has {len} bytes, expected {STATE_RECORD_SIZE}.")]
    Malformed { path: PathBuf, len: usize },
}

/// One flag of the state record, addressed by field position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum StateFlag {
    /// Freshly initiated into the scan directory; cleared once the
    /// supervisor confirms.
    ToInit,
    ToReload,
    ToRestart,
    /// Request flag consumed by the unsupervise routine.
    ToUnsupervise,
    ToParse,
    IsParsed,
    IsSupervised,
    IsUp,
}

impl StateFlag {
    const ALL: [Self; 8] = [
        Self::ToInit,
        Self::ToReload,
        Self::ToRestart,
        Self::ToUnsupervise,
        Self::ToParse,
        Self::IsParsed,
        Self::IsSupervised,
        Self::IsUp,
    ];
}

/// The unpacked runtime flags of one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateRecord {
    pub to_init: bool,
    pub to_reload: bool,
    pub to_restart: bool,
    pub to_unsupervise: bool,
    pub to_parse: bool,
    pub is_parsed: bool,
    pub is_supervised: bool,
    pub is_up: bool,
}

impl StateRecord {
    pub fn get(&self, flag: StateFlag) -> bool {
        match flag {
            StateFlag::ToInit => self.to_init,
            StateFlag::ToReload => self.to_reload,
            StateFlag::ToRestart => self.to_restart,
            StateFlag::ToUnsupervise => self.to_unsupervise,
            StateFlag::ToParse => self.to_parse,
            StateFlag::IsParsed => self.is_parsed,
            StateFlag::IsSupervised => self.is_supervised,
            StateFlag::IsUp => self.is_up,
        }
    }

    pub fn set(&mut self, flag: StateFlag, value: bool) {
        match flag {
            StateFlag::ToInit => self.to_init = value,
            StateFlag::ToReload => self.to_reload = value,
            StateFlag::ToRestart => self.to_restart = value,
            StateFlag::ToUnsupervise => self.to_unsupervise = value,
            StateFlag::ToParse => self.to_parse = value,
            StateFlag::IsParsed => self.is_parsed = value,
            StateFlag::IsSupervised => self.is_supervised = value,
            StateFlag::IsUp => self.is_up = value,
        }
    }

    /// Packs the record into its fixed 32-byte wire layout.
    pub fn pack(&self) -> [u8; STATE_RECORD_SIZE] {
        let mut bytes = [0u8; STATE_RECORD_SIZE];
        for (i, flag) in StateFlag::ALL.iter().enumerate() {
            let word: u32 = u32::from(self.get(*flag));
            bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    /// Unpacks a record from its wire layout. Any nonzero field is true.
    pub fn unpack(path: &Path, bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() != STATE_RECORD_SIZE {
            return Err(StateError::Malformed {
                path: path.to_path_buf(),
                len: bytes.len(),
            });
        }
        let mut record = Self::default();
        for (i, flag) in StateFlag::ALL.iter().enumerate() {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            record.set(*flag, u32::from_be_bytes(word) != 0);
        }
        Ok(record)
    }
}

/// Reads a service's state record. An absent file means the service was
/// never initialized and is returned as `None`, not an error.
pub fn read(path: &Path) -> Result<Option<StateRecord>, StateError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    StateRecord::unpack(path, &bytes).map(Some)
}

/// Writes a service's state record, creating parent directories on first
/// write. The whole 32-byte record is always rewritten; there are no
/// partial-field writes.
pub fn write(path: &Path, record: &StateRecord) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, record.pack())?;
    Ok(())
}

/// Single-flag setter. Internally a full read-modify-write against the
/// backing file; a missing file starts from the all-clear record.
pub fn set_flag(path: &Path, flag: StateFlag, value: bool) -> Result<(), StateError> {
    let mut record = read(path)?.unwrap_or_default();
    record.set(flag, value);
    write(path, &record)
}

/// Single-flag reader. A missing file reads as all flags clear.
pub fn check_flag(path: &Path, flag: StateFlag) -> Result<bool, StateError> {
    Ok(read(path)?.unwrap_or_default().get(flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pack_layout_is_stable() {
        let mut record = StateRecord::default();
        record.to_init = true;
        record.is_up = true;

        let bytes = record.pack();
        assert_eq!(bytes.len(), STATE_RECORD_SIZE);
        // Field 0 (to_init) and field 7 (is_up) are set, all others clear.
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..28], &[0u8; 24]);
        assert_eq!(&bytes[28..32], &[0, 0, 0, 1]);
    }

    #[test]
    fn unpack_reverses_pack() {
        let mut record = StateRecord::default();
        record.is_parsed = true;
        record.is_supervised = true;
        record.to_unsupervise = true;

        let bytes = record.pack();
        let decoded = StateRecord::unpack(Path::new("x"), &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn unpack_accepts_any_nonzero_word_as_true() {
        let mut bytes = [0u8; STATE_RECORD_SIZE];
        bytes[20..24].copy_from_slice(&7u32.to_be_bytes()); // is_parsed
        let record = StateRecord::unpack(Path::new("x"), &bytes).unwrap();
        assert!(record.is_parsed);
        assert!(!record.is_up);
    }

    #[test]
    fn short_record_is_malformed() {
        let err = StateRecord::unpack(Path::new("x"), &[0u8; 12]).unwrap_err();
        assert!(matches!(err, StateError::Malformed { len: 12, .. }));
    }

    #[test]
    fn absent_file_means_never_initialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/root/ghost");
        assert!(read(&path).unwrap().is_none());
        assert!(!check_flag(&path, StateFlag::IsSupervised).unwrap());
    }

    #[test]
    fn set_flag_is_a_full_read_modify_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/root/httpd");

        // First write creates the parent directories.
        set_flag(&path, StateFlag::IsParsed, true).unwrap();
        set_flag(&path, StateFlag::IsUp, true).unwrap();

        let record = read(&path).unwrap().unwrap();
        assert!(record.is_parsed);
        assert!(record.is_up);
        assert!(!record.to_init);

        set_flag(&path, StateFlag::IsUp, false).unwrap();
        let record = read(&path).unwrap().unwrap();
        assert!(record.is_parsed);
        assert!(!record.is_up);
    }
}
