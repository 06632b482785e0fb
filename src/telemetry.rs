//! Structured logging setup.
//!
//! Logs go to a file under the user's home directory when telemetry is
//! enabled, to stdout otherwise. `RUST_LOG` overrides the default `info`
//! filter either way.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// # Errors
/// Returns error if the log file or its parent directory cannot be created
pub fn init(enabled: bool, log_path: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !enabled {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return Ok(());
    }

    let expanded_path = expand_log_path(log_path)?;

    if let Some(parent) = expanded_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&expanded_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_target(false)
        .with_ansi(false)
        .init();

    tracing::info!("logging to {}", expanded_path.display());

    Ok(())
}

fn expand_log_path(path: &str) -> Result<PathBuf> {
    if let Some(stripped) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(stripped))
    } else {
        Ok(PathBuf::from(path))
    }
}
