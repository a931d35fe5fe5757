use alloc::sync::Arc;
use core::fmt;

use tokio::sync::watch;

use crate::{
    cache::CacheStore,
    config::CoordinatorConfig,
    events::{CoordinatorEvent, EventSink},
    fetch::Fetch,
    lock::RoleLock,
};

/// Role of a coordinator instance.
///
/// Starts as either variant; the only transition is `Follower` to `Leader`, at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Follower,
    Leader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::Follower => "follower",
            Self::Leader => "leader",
        })
    }
}

pub(crate) type RoleTx = watch::Sender<Role>;
pub type RoleRx = watch::Receiver<Role>;

/// State shared between the coordinator handle and its background loop.
pub(crate) struct Shared {
    pub config: CoordinatorConfig,
    pub fetcher: Arc<dyn Fetch>,
    pub cache: CacheStore,
    pub lock: Arc<dyn RoleLock>,
    pub sink: Arc<dyn EventSink>,
    pub role_tx: RoleTx,
}

impl Shared {
    pub fn role(&self) -> Role {
        *self.role_tx.borrow()
    }

    pub fn emit(&self, event: &CoordinatorEvent) {
        self.sink.on_event(event);
    }

    /// Moves the role to `Leader`. Returns `false` if it already was.
    pub fn promote(&self) -> bool {
        // send_if_modified updates the value even when nobody subscribed.
        self.role_tx.send_if_modified(|role| {
            if *role == Role::Leader {
                false
            } else {
                *role = Role::Leader;
                true
            }
        })
    }
}
