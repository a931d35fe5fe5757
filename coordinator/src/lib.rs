//! Host-local coordination of Azure scheduled events polling.
//!
//! Any number of processes on one host can start a [`Coordinator`]; a file lock elects a
//! single leader that polls the metadata endpoint and shares the result through a cache
//! file. Followers read that file and take over when the leader goes away.
//!
//! Exposes `inner_main` so a workspace-level shim binary can call into the CLI logic.
#![cfg_attr(
    test,
    expect(
        clippy::indexing_slicing,
        clippy::unwrap_used,
        reason = "This is not problematic in tests",
    )
)]

extern crate alloc;
extern crate core;

mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod events;
pub mod fetch;
pub mod lock;
pub mod notice;
mod run;

use std::{env, io, sync::Once};

use eyre::Result;
use tracing::{Instrument as _, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

pub use app::{Coordinator, CoordinatorError, Role, RoleRx};
pub use config::{CoordinatorConfig, LeaderReads, NoticeConfig};
pub use events::{CoordinatorEvent, EventSink, TracingSink};
pub use fetch::{Fetch, FetchError, FetchResult, HttpFetcher};
pub use notice::NoticeWatcher;
pub use scheduled_events_common as common;

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();

/// Installs the global tracing subscriber, once per process. Logs go to stderr so stdout
/// stays machine readable.
fn init_tracing(log_format: LogFormat) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var("SCHEDULED_EVENTS_INTEGRATION_TEST").is_ok() {
            "error"
        } else {
            "info"
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339())
            .with_writer(io::stderr);

        match log_format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

/// The tool's main function; can be called from a shim binary.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the chosen command fails.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    init_tracing(invocation.global.log_format);

    let config = run::resolve_config(&invocation.global).await?;

    let startup_span = tracing::info_span!(
        "scheduled_events",
        config_path = ?invocation.global.config,
        lock_path = ?config.lock_path,
        pid = ?std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
    );
    async move {
        info!(endpoint = %config.endpoint, "Starting");
        match invocation.command {
            Command::Watch => run::watch(config).await,
            Command::Get => run::get(config).await,
            Command::Approve { event_ids } => run::approve(&config, event_ids).await,
            Command::WaitForNotice => run::wait_for_notice(config).await,
        }
    }
    .instrument(startup_span)
    .await
}
