//! Configuration management for the coordinator: defaults, the optional TOML file and
//! path resolution.
//!
//! This module provides a unified interface to all configuration-related functionality,
//! including data types and loading utilities.

mod loader;
mod types;

pub use loader::*;
pub use types::*;
