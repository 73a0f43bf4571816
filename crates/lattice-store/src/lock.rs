//! Cross-process advisory file lock with a bounded wait
//!
//! One lock artifact guards one record file, colocated with it
//! (`<record>.json.lock`). Acquisition polls the OS advisory lock until a
//! deadline; the guard releases on drop, so the lock is freed on every
//! exit path including panics and early returns.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// How long to sleep between acquisition attempts
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Failure to acquire a [`PathLock`]
#[derive(Error, Debug)]
pub enum LockError {
    /// Another holder kept the lock for the whole bounded wait
    #[error("could not acquire lock on {path} within {timeout:?}")]
    Timeout {
        /// The lock artifact that stayed contended
        path: PathBuf,
        /// The wait that elapsed
        timeout: Duration,
    },

    /// The lock file could not be created or locked for non-contention reasons
    #[error("lock file {path} unusable: {source}")]
    Io {
        /// The lock artifact involved
        path: PathBuf,
        /// The underlying failure
        #[source]
        source: std::io::Error,
    },
}

/// A held advisory lock on a path; released on drop
#[derive(Debug)]
pub struct PathLock {
    file: File,
    path: PathBuf,
}

impl PathLock {
    /// Acquire an exclusive lock on `path`, waiting at most `timeout`
    ///
    /// The lock file is created if absent and is never removed; only the
    /// advisory lock state matters.
    ///
    /// # Errors
    /// [`LockError::Timeout`] when contention outlasts the deadline,
    /// [`LockError::Io`] on any other filesystem failure.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(err) if is_contention(&err) => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(LockError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    /// The lock artifact this guard holds
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        // Best effort; the OS drops advisory locks with the handle anyway
        let _ = FileExt::unlock(&self.file);
    }
}

/// Whether a lock failure means "someone else holds it" rather than a
/// real I/O problem
fn is_contention(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
