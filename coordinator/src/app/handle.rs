//! The public coordinator handle.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

use thiserror::Error as ThisError;
use tokio::{
    runtime::{Handle, TryCurrentError},
    sync::watch,
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use super::{
    runtime,
    state::{Role, RoleRx, Shared},
};
use crate::{
    cache::CacheStore,
    config::{CoordinatorConfig, LeaderReads},
    events::{CoordinatorEvent, EventSink, describe_error},
    fetch::{Fetch, FetchResult},
    lock::{FileRoleLock, LockError, RoleLock},
};

/// Failures that prevent a coordinator from starting in either role.
#[derive(Debug, ThisError)]
pub enum CoordinatorError {
    #[error("Coordinator must be started from within a tokio runtime")]
    NoRuntime(#[source] TryCurrentError),
    #[error("Role lock is unusable")]
    Lock(#[from] LockError),
}

/// Elects one process per host to poll upstream and lets every other process read
/// the result from the shared cache.
///
/// One background task runs per instance. [`Coordinator::shutdown`] should be called
/// before exit: dropping the handle stops the task and frees the lock, but leaves the
/// cache file behind.
pub struct Coordinator {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl Coordinator {
    /// Starts a coordinator using the file lock at `config.lock_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime or if the lock file cannot be used.
    pub fn start(
        config: CoordinatorConfig,
        fetcher: Arc<dyn Fetch>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, CoordinatorError> {
        let lock = Arc::new(FileRoleLock::new(config.lock_path.clone()));
        Self::with_lock(config, fetcher, lock, sink)
    }

    /// Starts a coordinator on an arbitrary [`RoleLock`].
    ///
    /// The lock is tried exactly once, synchronously; the result decides the initial role.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime or if the lock primitive fails.
    pub fn with_lock(
        config: CoordinatorConfig,
        fetcher: Arc<dyn Fetch>,
        lock: Arc<dyn RoleLock>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, CoordinatorError> {
        let tokio_handle = Handle::try_current().map_err(CoordinatorError::NoRuntime)?;

        let role = if lock.try_acquire()? {
            sink.on_event(&CoordinatorEvent::AcquiredLock);
            Role::Leader
        } else {
            sink.on_event(&CoordinatorEvent::StartedAsFollower);
            Role::Follower
        };

        let (role_tx, _) = watch::channel(role);
        let cache = CacheStore::new(config.cache_path.clone(), config.cache_expiry(), sink.clone());
        let shared = Arc::new(Shared {
            config,
            fetcher,
            cache,
            lock,
            sink,
            role_tx,
        });

        let cancel = CancellationToken::new();
        let task = tokio_handle.spawn(
            runtime::run(shared.clone(), cancel.clone())
                .instrument(tracing::info_span!("scheduled_events.coordinator")),
        );

        Ok(Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
            disposed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.shared.role()
    }

    /// Observes the role; the only change ever published is the promotion to leader.
    #[must_use]
    pub fn subscribe_role(&self) -> RoleRx {
        self.shared.role_tx.subscribe()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        self.shared.cache.path()
    }

    /// Returns the current notification document.
    ///
    /// Leaders ask upstream (unless configured to prefer their cache). Followers serve a
    /// fresh cache entry and only go upstream on a miss. `Ok(None)` means upstream had
    /// no content.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error when an upstream request was needed and failed.
    pub async fn get(&self) -> FetchResult {
        let role = self.role();
        let consult_cache = match role {
            Role::Follower => true,
            Role::Leader => self.shared.config.leader_reads == LeaderReads::PreferCache,
        };
        if consult_cache {
            if let Some(entry) = self.shared.cache.read() {
                return Ok(entry.into_document());
            }
            if role == Role::Follower {
                self.shared.emit(&CoordinatorEvent::CacheMissFallback);
            }
        }
        self.shared.fetcher.fetch().await
    }

    /// Stops the background loop and gives up the role.
    ///
    /// Waits up to the configured grace period for the loop, then aborts it. If this
    /// instance holds the lock, the cache file is deleted before the lock is released,
    /// so nobody serves data whose writer is gone. Only the first call does anything;
    /// failures are reported to the event sink.
    pub async fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut task) = task {
            let grace = self.shared.config.shutdown_grace();
            if timeout(grace, &mut task).await.is_err() {
                self.shared
                    .emit(&CoordinatorEvent::ShutdownTimedOut { waited: grace });
                task.abort();
            }
        }

        if self.shared.lock.is_held() {
            match self.shared.cache.remove() {
                Ok(true) => self.shared.emit(&CoordinatorEvent::CacheRemoved),
                Ok(false) => {}
                Err(e) => self.shared.emit(&CoordinatorEvent::CacheRemoveFailed {
                    error: describe_error(&e),
                }),
            }
        }
        self.shared.lock.release();
        self.shared.emit(&CoordinatorEvent::Disposed);
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.shared.lock.release();
    }
}
