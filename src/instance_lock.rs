//! Single instance lock using a Unix socket.
//!
//! Only one controller may drive the GPIO pins. The lock is a bound Unix
//! socket, which the OS releases when the process dies, so a crash never
//! leaves a stale lock behind.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOCKET_NAME: &str = "sunshade-controller.sock";

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another controller is already running (lock {0:?})")]
    AlreadyRunning(PathBuf),

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for the lifetime of the process; dropping it removes the socket.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at the default socket path.
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(&Self::socket_path())
    }

    pub fn acquire_at(path: &Path) -> Result<Self, InstanceLockError> {
        if path.exists() {
            // A socket nobody answers on is left over from a killed process
            if UnixStream::connect(path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(path.to_path_buf()));
            }
            let _ = std::fs::remove_file(path);
        }

        match UnixListener::bind(path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(path.to_path_buf()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    /// `$XDG_RUNTIME_DIR/sunshade-controller.sock`, or under `/tmp`.
    pub fn socket_path() -> PathBuf {
        socket_path_in(std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn socket_path_in(runtime_dir: Option<PathBuf>) -> PathBuf {
    runtime_dir
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_NAME)
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
