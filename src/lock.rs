//! Single-instance lock file.
//!
//! Nothing in a sync run tolerates a second run overlapping it, so the
//! whole program takes a lock file before touching anything. Creation is
//! atomic (`create_new`), and the guard removes the file when dropped.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Create the lock file, failing if one is already present.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => anyhow::bail!(
                "'{}' is present.\n\
                 - Reason 1: the application is already running -> wait for its end and retry.\n\
                 - Reason 2: the previous run failed -> check the log file to understand why, \
                 and then delete the lock file.",
                path.display()
            ),
            Err(err) => {
                Err(err).with_context(|| format!("invalid lock location '{}'", path.display()))
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %err,
                "unable to delete the lock file"
            );
        }
    }
}
