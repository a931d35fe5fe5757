//! The scheduled events document.
//!
//! Field names follow the upstream JSON (`PascalCase`). Only the incarnation and the
//! presence of events matter to the coordinator; everything else is carried through
//! unchanged for consumers.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::rfc1123;

/// Value upstream uses when an event's duration is not known.
pub const UNKNOWN_DURATION: i64 = -1;

/// The parsed result of one poll of the scheduled events endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationDocument {
    /// Changes whenever the set of events changes. Not guaranteed to be monotonic.
    pub document_incarnation: i64,
    #[serde(default)]
    pub events: Vec<NotificationEvent>,
}

impl NotificationDocument {
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Events that start within `notice` of `now`, in document order.
    pub fn imminent_events(
        &self,
        now: DateTime<Utc>,
        notice: TimeDelta,
    ) -> impl Iterator<Item = &NotificationEvent> {
        self.events
            .iter()
            .filter(move |event| event.is_imminent(now, notice))
    }
}

/// A single scheduled maintenance event. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationEvent {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_source: String,
    #[serde(default)]
    pub event_status: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub resources: Vec<String>,
    /// `None` means the event is already due or has no scheduled start.
    #[serde(default, with = "rfc1123::option")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default = "unknown_duration")]
    pub duration_in_seconds: i64,
    #[serde(default)]
    pub description: String,
}

const fn unknown_duration() -> i64 {
    UNKNOWN_DURATION
}

impl NotificationEvent {
    /// Typed view of `EventType`, `None` for values this crate does not know.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.parse().ok()
    }

    /// Typed view of `EventStatus`, `None` for values this crate does not know.
    #[must_use]
    pub fn status(&self) -> Option<EventStatus> {
        self.event_status.parse().ok()
    }

    /// Whether the event starts no later than `notice` after `now`.
    ///
    /// Events without a `NotBefore` are always imminent, as are events whose notice window
    /// reaches back past the representable range.
    #[must_use]
    pub fn is_imminent(&self, now: DateTime<Utc>, notice: TimeDelta) -> bool {
        self.not_before.is_none_or(|not_before| {
            not_before
                .checked_sub_signed(notice)
                .is_none_or(|window_opens| window_opens <= now)
        })
    }
}

// Macro to define the enum from variant => string mappings
macro_rules! define_enum_with_str {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $str:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
        }

        impl $name {
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match *self {
                    $($name::$variant => $str,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($str => Ok($name::$variant),)*
                    _ => Err(()),
                }
            }
        }
    };
}

define_enum_with_str! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Kinds of maintenance announced by the platform.
    pub enum EventKind {
        /// The VM is paused for a few seconds; memory and open files are preserved.
        Freeze => "Freeze",
        /// The VM is rebooted; non-persistent memory is lost.
        Reboot => "Reboot",
        /// The VM moves to another host; temporary disks are lost.
        Redeploy => "Redeploy",
        /// A spot VM is being evicted.
        Preempt => "Preempt",
        /// The VM is being deleted.
        Terminate => "Terminate",
    }
}

define_enum_with_str! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Lifecycle status of an event.
    pub enum EventStatus {
        Scheduled => "Scheduled",
        Started => "Started",
    }
}
