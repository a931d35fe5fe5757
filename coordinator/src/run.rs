//! Implementations of the CLI subcommands.

use alloc::sync::Arc;
use core::time::Duration;
use std::io::{self, Write as _};

use eyre::{Result, WrapErr as _};
use scheduled_events_common::{NotificationDocument, NotificationEvent};
use tokio::{signal, time::sleep};
use tracing::{info, warn};

use crate::{
    app::Coordinator,
    cli::GlobalArgs,
    config::{self, CoordinatorConfig, LeaderReads},
    events::{TracingSink, describe_error},
    notice::NoticeWatcher,
};

/// Creates a future that resolves when a shutdown signal (SIGTERM or Ctrl-C) is received.
pub(crate) async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => Ok(()),
            res = signal::ctrl_c() => res,
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}

/// Builds the effective configuration: defaults, then the config file, then CLI overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub(crate) async fn resolve_config(global: &GlobalArgs) -> Result<CoordinatorConfig> {
    let mut config = match global.config {
        Some(ref path) => config::load(path).await?,
        None => CoordinatorConfig::default(),
    };
    if let Some(ref endpoint) = global.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if let Some(ref lock_path) = global.lock_path {
        config.lock_path.clone_from(lock_path);
    }
    if let Some(ref cache_path) = global.cache_path {
        config.cache_path.clone_from(cache_path);
    }
    Ok(config)
}

/// Long-running readers share the cadence of the leader loop, so a leader among them serves
/// its own fresh cache instead of adding upstream requests.
fn for_observers(mut config: CoordinatorConfig) -> CoordinatorConfig {
    config.leader_reads = LeaderReads::PreferCache;
    config
}

fn start_coordinator(config: CoordinatorConfig) -> Result<Arc<Coordinator>> {
    let fetcher = config
        .http_fetcher()
        .wrap_err("Failed to build the HTTP client")?;
    let coordinator = Coordinator::start(config, Arc::new(fetcher), Arc::new(TracingSink))
        .wrap_err("Failed to start the coordinator")?;
    info!(role = %coordinator.role(), "Coordinator started");
    Ok(Arc::new(coordinator))
}

fn print_json(document: Option<&NotificationDocument>) -> Result<()> {
    let line = serde_json::to_string(&document)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

fn print_event(event: Option<&NotificationEvent>) -> Result<()> {
    let line = serde_json::to_string(&event)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

async fn print_changes(coordinator: &Coordinator, interval: Duration) -> Result<()> {
    let mut last: Option<Option<NotificationDocument>> = None;
    loop {
        match coordinator.get().await {
            Ok(document) => {
                if last.as_ref() != Some(&document) {
                    print_json(document.as_ref())?;
                    last = Some(document);
                }
            }
            Err(e) => warn!(error = %describe_error(&e), "Failed to read scheduled events"),
        }
        sleep(interval).await;
    }
}

/// Runs a coordinator until a shutdown signal, printing each document that differs from the
/// previous one.
///
/// # Errors
///
/// Returns an error if the coordinator cannot start or stdout is gone.
pub(crate) async fn watch(config: CoordinatorConfig) -> Result<()> {
    let interval = config.http_poll_interval();
    let coordinator = start_coordinator(for_observers(config))?;

    let result = tokio::select! {
        res = print_changes(&coordinator, interval) => res,
        res = shutdown_signal() => {
            info!("Received shutdown, shutting down");
            res.wrap_err("Failed to listen for shutdown signals")
        }
    };
    coordinator.shutdown().await;
    result
}

/// Prints the current document once.
///
/// # Errors
///
/// Returns an error if the coordinator cannot start or the read fails.
pub(crate) async fn get(config: CoordinatorConfig) -> Result<()> {
    let coordinator = start_coordinator(config)?;
    let result = coordinator.get().await;
    coordinator.shutdown().await;
    print_json(result?.as_ref())
}

/// Approves the given events directly against the endpoint.
///
/// # Errors
///
/// Returns an error if the request fails.
pub(crate) async fn approve(config: &CoordinatorConfig, event_ids: Vec<String>) -> Result<()> {
    let fetcher = config
        .http_fetcher()
        .wrap_err("Failed to build the HTTP client")?;
    fetcher
        .approve(event_ids)
        .await
        .wrap_err("Failed to approve scheduled events")
}

/// Waits until maintenance is imminent or a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the coordinator cannot start or signals cannot be observed.
pub(crate) async fn wait_for_notice(config: CoordinatorConfig) -> Result<()> {
    let notice = config.notice;
    let coordinator = start_coordinator(for_observers(config))?;
    let watcher = NoticeWatcher::spawn(coordinator.clone(), notice);
    let token = watcher.token();

    let result = tokio::select! {
        () = token.cancelled() => {
            info!("Maintenance is imminent");
            print_event(watcher.trigger())
        }
        res = shutdown_signal() => {
            info!("Received shutdown before any notice");
            res.wrap_err("Failed to listen for shutdown signals")
        }
    };
    watcher.stop().await;
    coordinator.shutdown().await;
    result
}
