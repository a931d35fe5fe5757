//! The background loop of a coordinator.
//!
//! A single task runs per coordinator. Each iteration looks at the current role and runs
//! one follower or leader step, then sleeps. Promotion flips the role in place, so the
//! next iteration is already a leader step without spawning anything.

use alloc::sync::Arc;
use core::{any::Any, panic::AssertUnwindSafe, time::Duration};

use futures::FutureExt as _;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::state::{Role, Shared};
use crate::events::{CoordinatorEvent, describe_error};

/// Runs the role loop until `cancel` fires.
pub(crate) async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut current = shared.role();
    shared.emit(&loop_started(current));

    while !cancel.is_cancelled() {
        let role = shared.role();
        if role != current {
            shared.emit(&loop_ended(current));
            shared.emit(&loop_started(role));
            current = role;
        }

        let delay = match role {
            Role::Follower => match follower_step(&shared) {
                Next::Promoted => continue,
                Next::After(delay) => delay,
            },
            Role::Leader => match leader_step(&shared, &cancel).await {
                Some(delay) => delay,
                None => break,
            },
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = sleep(delay) => {}
        }
    }

    shared.emit(&loop_ended(current));
}

const fn loop_started(role: Role) -> CoordinatorEvent {
    match role {
        Role::Follower => CoordinatorEvent::FollowerLoopStarted,
        Role::Leader => CoordinatorEvent::LeaderLoopStarted,
    }
}

const fn loop_ended(role: Role) -> CoordinatorEvent {
    match role {
        Role::Follower => CoordinatorEvent::FollowerLoopEnded,
        Role::Leader => CoordinatorEvent::LeaderLoopEnded,
    }
}

/// What the loop does after a follower step.
enum Next {
    /// Start leading in the very next iteration, without sleeping.
    Promoted,
    After(Duration),
}

/// Tries to take the role lock.
fn follower_step(shared: &Shared) -> Next {
    match shared.lock.try_acquire() {
        Ok(true) => {
            if shared.promote() {
                shared.emit(&CoordinatorEvent::Promoted);
            }
            Next::Promoted
        }
        Ok(false) => Next::After(shared.config.lock_check_interval()),
        Err(e) => {
            shared.emit(&CoordinatorEvent::LoopError {
                role: Role::Follower,
                error: describe_error(&e),
            });
            Next::After(shared.config.error_backoff())
        }
    }
}

/// Polls upstream once and refreshes the cache. Returns `None` if cancelled mid-fetch.
async fn leader_step(shared: &Shared, cancel: &CancellationToken) -> Option<Duration> {
    // The async block defers the call, so a fetcher panicking before returning its future is caught too.
    let fetch = AssertUnwindSafe(async { shared.fetcher.fetch().await }).catch_unwind();
    let outcome = tokio::select! {
        () = cancel.cancelled() => return None,
        outcome = fetch => outcome,
    };
    // A fetch that blocked past shutdown must not write a cache its owner already removed.
    if cancel.is_cancelled() {
        return None;
    }

    Some(match outcome {
        Ok(Ok(document)) => {
            shared.cache.write(document.as_ref());
            shared.config.http_poll_interval()
        }
        Ok(Err(e)) => {
            shared.emit(&CoordinatorEvent::FetchFailed {
                error: describe_error(&e),
            });
            shared.config.error_backoff()
        }
        Err(panic) => {
            shared.emit(&CoordinatorEvent::LoopError {
                role: Role::Leader,
                error: format!("fetcher panicked: {}", panic_message(panic.as_ref())),
            });
            shared.config.error_backoff()
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
