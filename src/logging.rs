//! Diagnostic logging setup.
//!
//! Diagnostics go to a JSON-lines log file; user-facing output stays on
//! stdout/stderr. The file records warnings by default, everything down to
//! debug with `--debug`. `RUST_LOG` overrides the level when set.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init(log_path: &Path, debug: bool) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .with_context(|| format!("can't open the log file '{}'", log_path.display()))?;

    let default_level = if debug { "warn,feedmirror=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
