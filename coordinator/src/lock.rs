//! Host-wide exclusive role lock.
//!
//! The lock is an advisory `flock(2)` on a well-known file. The kernel drops it when
//! the descriptor is closed, including when the holding process dies, so a crashed
//! leader frees the role without any cleanup on our side.

use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::OpenOptionsExt as _,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};
use thiserror::Error as ThisError;

/// Failures of the lock primitive itself. Contention is not an error.
#[derive(Debug, ThisError)]
pub enum LockError {
    #[error("Failed to open lock file at {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("flock on {path:?} failed")]
    Flock {
        path: PathBuf,
        #[source]
        source: Errno,
    },
}

/// A named, host-wide, non-blocking exclusive lock.
pub trait RoleLock: Send + Sync {
    /// Tries to take the lock without blocking.
    ///
    /// Returns `Ok(true)` if this handle holds the lock after the call (including when it
    /// already held it), `Ok(false)` if another holder has it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying primitive is unusable.
    fn try_acquire(&self) -> Result<bool, LockError>;

    /// Releases the lock if held. Safe to call any number of times.
    ///
    /// Returns whether this call released anything.
    fn release(&self) -> bool;

    fn is_held(&self) -> bool;
}

/// [`RoleLock`] backed by `flock` on a file.
///
/// Locks taken through separate `FileRoleLock`s conflict even inside one process,
/// since `flock` is bound to the open file description.
#[derive(Debug)]
pub struct FileRoleLock {
    path: PathBuf,
    held: Mutex<Option<Flock<File>>>,
}

impl FileRoleLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, LockError> {
        // World-writable so processes of other users can share the lock file; umask still applies.
        let created = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o666)
            .open(&self.path);
        let opened = match created {
            // Someone else owns the file; flock only needs a readable descriptor.
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => File::open(&self.path),
            other => other,
        };
        opened.map_err(|source| LockError::Open {
            path: self.path.clone(),
            source,
        })
    }
}

impl RoleLock for FileRoleLock {
    fn try_acquire(&self) -> Result<bool, LockError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.is_some() {
            return Ok(true);
        }
        let file = self.open()?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                *held = Some(lock);
                Ok(true)
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(false),
            Err((_, source)) => Err(LockError::Flock {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn release(&self) -> bool {
        let taken = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(lock) => {
                // Closing the descriptor drops the lock as well, so a failed unlock is harmless.
                if let Err((lock, errno)) = lock.unlock() {
                    tracing::debug!("Explicit unlock of {:?} failed: {errno}", self.path);
                    drop(lock);
                }
                true
            }
            None => false,
        }
    }

    fn is_held(&self) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
