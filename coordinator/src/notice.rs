//! Turns an upcoming maintenance event into a cancellation signal.

use alloc::sync::Arc;
use std::sync::OnceLock;

use chrono::{TimeDelta, Utc};
use scheduled_events_common::NotificationEvent;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, debug, info, warn};

use crate::{app::Coordinator, config::NoticeConfig, events::describe_error};

/// Polls a [`Coordinator`] and cancels a token once any event is within the notice
/// period of its `NotBefore`.
///
/// The token is cancelled at most once and polling ends with it.
pub struct NoticeWatcher {
    token: CancellationToken,
    stop: CancellationToken,
    trigger: Arc<OnceLock<NotificationEvent>>,
    task: JoinHandle<()>,
}

impl NoticeWatcher {
    /// Starts polling right away. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(coordinator: Arc<Coordinator>, config: NoticeConfig) -> Self {
        let token = CancellationToken::new();
        let stop = CancellationToken::new();
        let trigger = Arc::new(OnceLock::new());
        let task = tokio::spawn(
            watch(
                coordinator,
                config,
                token.clone(),
                stop.clone(),
                trigger.clone(),
            )
            .instrument(tracing::info_span!("scheduled_events.notice")),
        );
        Self {
            token,
            stop,
            trigger,
            task,
        }
    }

    /// Cancelled when maintenance is imminent.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The event that cancelled the token, once it has been cancelled.
    #[must_use]
    pub fn trigger(&self) -> Option<&NotificationEvent> {
        self.trigger.get()
    }

    /// Ends polling without cancelling the token.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Notice watcher task failed");
        }
    }
}

async fn watch(
    coordinator: Arc<Coordinator>,
    config: NoticeConfig,
    token: CancellationToken,
    stop: CancellationToken,
    trigger: Arc<OnceLock<NotificationEvent>>,
) {
    let period = TimeDelta::from_std(config.period()).unwrap_or(TimeDelta::MAX);

    while !coordinator.is_disposed() {
        match coordinator.get().await {
            Ok(Some(document)) => {
                if let Some(event) = document.imminent_events(Utc::now(), period).next() {
                    info!(
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        not_before = ?event.not_before,
                        "Scheduled event is imminent, cancelling"
                    );
                    drop(trigger.set(event.clone()));
                    token.cancel();
                    return;
                }
            }
            Ok(None) => debug!("No scheduled events document"),
            Err(e) => warn!(error = %describe_error(&e), "Failed to check scheduled events"),
        }

        tokio::select! {
            () = stop.cancelled() => return,
            () = sleep(config.check_interval()) => {}
        }
    }
    debug!("Coordinator disposed, notice watcher stopping");
}
