//! Project-level file locking for cross-process coordination.
//!
//! The install engine mutates the install directory and the manifest without
//! any in-process locking, so only one engine may drive a context directory at
//! a time. Every mutating CLI command holds a [`ProjectLock`] for its whole run.
//! The lock is released when the value is dropped.

use crate::constants::{DEFAULT_LOCK_TIMEOUT, PROJECT_LOCK_DIR};
use crate::utils::backoff::backoff_delay;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// An exclusive OS file lock on `{context}/.nupm/{name}.lock`.
///
/// # Example
///
/// ```rust,no_run
/// use nupm_cli::utils::ProjectLock;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let _lock = ProjectLock::acquire(Path::new("/path/to/project"), "restore")?;
/// // install directory and manifest are ours until _lock is dropped
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProjectLock {
    _file: File,
    lock_name: String,
    lock_path: PathBuf,
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        debug!(lock_name = %self.lock_name, "Project lock released");
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(lock_name = %self.lock_name, error = %e, "Failed to remove lock file");
            }
        }
    }
}

impl ProjectLock {
    /// Acquires the lock, waiting up to the default timeout (30 seconds).
    pub fn acquire(context_dir: &Path, lock_name: &str) -> Result<Self> {
        Self::acquire_with_timeout(context_dir, lock_name, DEFAULT_LOCK_TIMEOUT)
    }

    /// Acquires the lock, polling with exponential backoff (10ms up to 500ms)
    /// until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Fails when the lock directory cannot be created, the lock file cannot be
    /// opened, or another process still holds the lock after `timeout`.
    pub fn acquire_with_timeout(
        context_dir: &Path,
        lock_name: &str,
        timeout: Duration,
    ) -> Result<Self> {
        debug!(lock_name, "Waiting for project lock");

        let lock_dir = context_dir.join(PROJECT_LOCK_DIR);
        std::fs::create_dir_all(&lock_dir).with_context(|| {
            format!("Failed to create project lock directory: {}", lock_dir.display())
        })?;

        let lock_path = lock_dir.join(format!("{lock_name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        let start = Instant::now();
        let mut attempt = 0;
        loop {
            if let Ok(true) = file.try_lock_exclusive() {
                debug!(lock_name, wait_ms = start.elapsed().as_millis(), "Project lock acquired");
                return Ok(Self {
                    _file: file,
                    lock_name: lock_name.to_string(),
                    lock_path,
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(anyhow::anyhow!(
                    "Timeout acquiring project lock '{lock_name}' after {timeout:?}; is another nupm process running in {}?",
                    context_dir.display()
                ));
            }
            std::thread::sleep(backoff_delay(attempt).min(remaining));
            attempt = attempt.saturating_add(1);
        }
    }
}
