//! Command-line interface definitions for the scheduled events tool.
//!
//! This module contains the CLI argument parsing structures and enums
//! used by the `scheduled_events` binary.

use std::{env, path::PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "scheduled_events")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Explicit flags override the config file.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Path to an optional TOML configuration file
    #[arg(short, long, global = true, env = "SCHEDULED_EVENTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override for the scheduled events endpoint URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Override for the role lock file
    #[arg(long, global = true)]
    pub lock_path: Option<PathBuf>,

    /// Override for the shared cache file
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a coordinator and print every distinct document as a JSON line until terminated.
    Watch,

    /// Print the current document once as JSON (`null` when there is no content).
    Get,

    /// Ask the platform to start the given events now.
    Approve {
        /// Identifier of an event to approve; may be repeated
        #[arg(long = "event-id", required = true)]
        event_ids: Vec<String>,
    },

    /// Block until an event is within the notice period, then exit successfully.
    WaitForNotice,
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
    Pretty,
}
