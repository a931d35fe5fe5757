//! Configuration loading utilities for the coordinator.
//!
//! This module provides functions for reading and parsing
//! configuration files from disk.

use std::path::Path;

use eyre::WrapErr as _;
use tokio::fs;

use crate::config::CoordinatorConfig;

/// Reads and parses the coordinator config from a TOML file.
///
/// Relative paths inside the file are resolved against the file's directory.
///
/// # Errors
///
/// Returns an error if the config file cannot be read, parsed or validated.
pub async fn load<P: AsRef<Path>>(path: P) -> eyre::Result<CoordinatorConfig> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(path_ref).await.wrap_err(format!(
        "Failed to read config file at: {}",
        path_ref.display()
    ))?;
    let config: CoordinatorConfig = toml::from_str(&content).wrap_err(format!(
        "Failed to parse config as TOML at: {}",
        path_ref.display()
    ))?;
    config.validate().wrap_err(format!(
        "Invalid config at: {}",
        path_ref.display()
    ))?;
    Ok(config.resolve_paths(path_ref))
}
