//! Structured notifications for every notable coordinator transition.
//!
//! The coordinator never logs directly; it reports a [`CoordinatorEvent`] to an
//! [`EventSink`]. [`TracingSink`] is the default and turns events into log lines.

use core::{fmt, time::Duration};

use tracing::{Level, debug, error, info, warn};

use crate::app::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoordinatorEvent {
    /// The role lock was free at startup; this process leads.
    AcquiredLock,
    /// The role lock was taken at startup; this process follows.
    StartedAsFollower,
    /// A follower won the role lock.
    Promoted,
    LeaderLoopStarted,
    LeaderLoopEnded,
    FollowerLoopStarted,
    FollowerLoopEnded,
    /// A follower read found no usable cache entry and went upstream.
    CacheMissFallback,
    CacheExpired { age: Duration },
    CacheReadFailed { error: String },
    CacheWriteFailed { error: String },
    /// The cache file was deleted on shutdown by the lock holder.
    CacheRemoved,
    CacheRemoveFailed { error: String },
    /// A leader poll failed; the loop backs off.
    FetchFailed { error: String },
    /// A background loop hit an error unrelated to lock contention; the loop backs off.
    LoopError { role: Role, error: String },
    /// The background loop did not stop within the grace period; it was aborted.
    ShutdownTimedOut { waited: Duration },
    Disposed,
}

impl CoordinatorEvent {
    /// Stable identifier, suitable for metrics labels and assertions.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match *self {
            Self::AcquiredLock => "acquired_lock",
            Self::StartedAsFollower => "started_as_follower",
            Self::Promoted => "promoted",
            Self::LeaderLoopStarted => "leader_loop_started",
            Self::LeaderLoopEnded => "leader_loop_ended",
            Self::FollowerLoopStarted => "follower_loop_started",
            Self::FollowerLoopEnded => "follower_loop_ended",
            Self::CacheMissFallback => "cache_miss_fallback",
            Self::CacheExpired { .. } => "cache_expired",
            Self::CacheReadFailed { .. } => "cache_read_failed",
            Self::CacheWriteFailed { .. } => "cache_write_failed",
            Self::CacheRemoved => "cache_removed",
            Self::CacheRemoveFailed { .. } => "cache_remove_failed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::LoopError { .. } => "loop_error",
            Self::ShutdownTimedOut { .. } => "shutdown_timed_out",
            Self::Disposed => "disposed",
        }
    }

    #[must_use]
    pub const fn level(&self) -> Level {
        match *self {
            Self::CacheExpired { .. } => Level::DEBUG,
            Self::CacheMissFallback | Self::ShutdownTimedOut { .. } => Level::WARN,
            Self::CacheReadFailed { .. }
            | Self::CacheWriteFailed { .. }
            | Self::CacheRemoveFailed { .. }
            | Self::FetchFailed { .. }
            | Self::LoopError { .. } => Level::ERROR,
            Self::AcquiredLock
            | Self::StartedAsFollower
            | Self::Promoted
            | Self::LeaderLoopStarted
            | Self::LeaderLoopEnded
            | Self::FollowerLoopStarted
            | Self::FollowerLoopEnded
            | Self::CacheRemoved
            | Self::Disposed => Level::INFO,
        }
    }
}

impl fmt::Display for CoordinatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::AcquiredLock => f.write_str("Acquired global lock - running as leader"),
            Self::StartedAsFollower => f.write_str("Starting as follower - will read from cache"),
            Self::Promoted => f.write_str("Promoted from follower to leader"),
            Self::LeaderLoopStarted => f.write_str("Starting leader polling loop"),
            Self::LeaderLoopEnded => f.write_str("Leader polling loop ended"),
            Self::FollowerLoopStarted => f.write_str("Starting follower monitoring loop"),
            Self::FollowerLoopEnded => f.write_str("Follower monitoring loop ended"),
            Self::CacheMissFallback => {
                f.write_str("Cache miss or expired, falling back to direct HTTP call")
            }
            Self::CacheExpired { age } => write!(f, "Cache expired ({age:?} old)"),
            Self::CacheReadFailed { ref error } => write!(f, "Error reading from cache: {error}"),
            Self::CacheWriteFailed { ref error } => write!(f, "Error writing to cache: {error}"),
            Self::CacheRemoved => f.write_str("Removed cache file"),
            Self::CacheRemoveFailed { ref error } => {
                write!(f, "Error removing cache file: {error}")
            }
            Self::FetchFailed { ref error } => write!(f, "Error in leader loop: {error}"),
            Self::LoopError { role, ref error } => write!(f, "Error in {role} loop: {error}"),
            Self::ShutdownTimedOut { waited } => {
                write!(f, "Background loop did not stop within {waited:?}, aborting it")
            }
            Self::Disposed => f.write_str("Coordinator disposed"),
        }
    }
}

/// Renders an error with its whole source chain, `outer: inner: root`.
pub(crate) fn describe_error(error: &dyn core::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Receives coordinator events. Called inline from the emitting task, so implementations
/// should return quickly.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &CoordinatorEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &CoordinatorEvent) {
        let kind = event.kind();
        let level = event.level();
        if level == Level::ERROR {
            error!(kind, "{event}");
        } else if level == Level::WARN {
            warn!(kind, "{event}");
        } else if level == Level::INFO {
            info!(kind, "{event}");
        } else {
            debug!(kind, "{event}");
        }
    }
}
