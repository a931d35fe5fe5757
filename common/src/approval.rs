//! Request body for expediting scheduled events.

use serde::{Deserialize, Serialize};

/// A single event approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartRequest {
    pub event_id: String,
}

/// Body posted to the scheduled events endpoint to start events ahead of their `NotBefore`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartRequests {
    pub start_requests: Vec<StartRequest>,
}

impl StartRequests {
    /// Builds an approval body for the given event ids, in order.
    pub fn for_events<I, S>(event_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start_requests: event_ids
                .into_iter()
                .map(|id| StartRequest {
                    event_id: id.into(),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start_requests.is_empty()
    }
}
