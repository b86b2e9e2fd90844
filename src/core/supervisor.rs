// src/core/supervisor.rs

//! The narrow interface to the external process supervisor.
//!
//! The supervisor is a collaborator, not part of this crate: all we ever do
//! is write control bytes to the control channel of a live service
//! directory and read back its fixed-size status record. Return values
//! distinguish "nothing is listening" from "the directory is malformed"
//! from "accepted", because the lifecycle layer treats those very
//! differently.

use crate::constants::{CONTROL_FILE, STATUS_FILE};
use crate::core::paths;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Size in bytes of the supervisor's status record.
pub const STATUS_RECORD_SIZE: usize = 16;

/// Control bytes understood by the supervisor.
pub const CONTROL_UP: &[u8] = b"u";
pub const CONTROL_DOWN: &[u8] = b"d";
pub const CONTROL_RESTART: &[u8] = b"r";
pub const CONTROL_EXIT: &[u8] = b"x";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The control channel exists but no supervisor has it open.
    #[error("No supervisor is listening on '{dir}'.")]
    NotListening { dir: PathBuf },
    /// The live directory lacks the supervision layout entirely.
    #[error("Supervision directory '{dir}' is malformed or missing.")]
    Malformed { dir: PathBuf },
    /// The caller-supplied deadline expired.
    #[error("Timed out waiting for the supervisor at '{dir}'.")]
    TimedOut { dir: PathBuf },
    #[error("Supervisor status at '{path}' has {len} bytes, expected {STATUS_RECORD_SIZE}.")]
    MalformedStatus { path: PathBuf, len: usize },
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
}

/// The 4-tuple of liveness flags published by the supervisor for one
/// service, 4 bytes big-endian each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub is_running: bool,
    pub is_ready: bool,
    pub is_paused: bool,
    pub wants_up: bool,
}

impl SupervisorStatus {
    fn unpack(path: &Path, bytes: &[u8]) -> Result<Self, SupervisorError> {
        if bytes.len() != STATUS_RECORD_SIZE {
            return Err(SupervisorError::MalformedStatus {
                path: path.to_path_buf(),
                len: bytes.len(),
            });
        }
        let word = |i: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            u32::from_be_bytes(buf) != 0
        };
        Ok(Self {
            is_running: word(0),
            is_ready: word(1),
            is_paused: word(2),
            wants_up: word(3),
        })
    }
}

/// Writes control bytes to the service's control channel.
///
/// The open is non-blocking: a FIFO with no reader fails immediately with
/// `NotListening` instead of blocking the whole invocation, and a missing
/// channel in an otherwise-present supervise directory reports the same. A
/// missing supervise directory is `Malformed`.
pub fn send_control(service_dir: &Path, data: &[u8]) -> Result<(), SupervisorError> {
    let supervise = paths::supervise_dir(service_dir);
    if !supervise.is_dir() {
        return Err(SupervisorError::Malformed {
            dir: service_dir.to_path_buf(),
        });
    }
    let control = supervise.join(CONTROL_FILE);
    match OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&control)
    {
        Ok(mut channel) => {
            channel.write_all(data)?;
            log::debug!(
                "Sent control bytes {:?} to {}",
                data,
                control.display()
            );
            Ok(())
        }
        Err(e) if e.raw_os_error() == Some(libc::ENXIO) => Err(SupervisorError::NotListening {
            dir: service_dir.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SupervisorError::NotListening {
            dir: service_dir.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Reads the service's status record.
pub fn read_status(service_dir: &Path) -> Result<SupervisorStatus, SupervisorError> {
    let supervise = paths::supervise_dir(service_dir);
    if !supervise.is_dir() {
        return Err(SupervisorError::Malformed {
            dir: service_dir.to_path_buf(),
        });
    }
    let path = supervise.join(STATUS_FILE);
    match fs::read(&path) {
        Ok(bytes) => SupervisorStatus::unpack(&path, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SupervisorError::NotListening {
            dir: service_dir.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Polls the status record until `predicate` holds or the deadline expires.
/// `None` means no timeout: the wait is unbounded by design, matching the
/// supervisor's own default.
pub fn wait_status<F>(
    service_dir: &Path,
    timeout: Option<Duration>,
    predicate: F,
) -> Result<SupervisorStatus, SupervisorError>
where
    F: Fn(&SupervisorStatus) -> bool,
{
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        match read_status(service_dir) {
            Ok(status) if predicate(&status) => return Ok(status),
            // Not there yet; keep polling until the deadline.
            Ok(_) | Err(SupervisorError::NotListening { .. }) => {}
            Err(e) => return Err(e),
        }
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(SupervisorError::TimedOut {
                dir: service_dir.to_path_buf(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
