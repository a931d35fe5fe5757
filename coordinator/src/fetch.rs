//! Upstream access to the scheduled events endpoint.

use alloc::sync::Arc;
use core::time::Duration;

use futures::{FutureExt as _, future::BoxFuture};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error as ThisError;

use scheduled_events_common::{NotificationDocument, StartRequests};

/// The Azure instance metadata scheduled events endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "http://169.254.169.254/metadata/scheduledevents?api-version=2020-07-01";

pub type FetchResult = Result<Option<NotificationDocument>, FetchError>;

#[derive(Debug, ThisError)]
pub enum FetchError {
    #[error("Request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: StatusCode },
    #[error("Malformed scheduled events document")]
    Decode(#[from] serde_json::Error),
}

/// Source of notification documents.
///
/// `Ok(None)` means upstream explicitly answered with no content, which is not an error.
pub trait Fetch: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, FetchResult>;
}

impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    fn fetch(&self) -> BoxFuture<'_, FetchResult> {
        (**self).fetch()
    }
}

/// [`Fetch`] over HTTP against the instance metadata service.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    endpoint: String,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests each time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport(&self, source: reqwest::Error) -> FetchError {
        FetchError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = request
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: self.endpoint.clone(),
                status,
            });
        }
        Ok(response)
    }

    /// Fetches the current document.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or an unparsable body.
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn get(&self) -> FetchResult {
        let response = self.send(self.client.get(&self.endpoint)).await?;
        let body = response.bytes().await.map_err(|e| self.transport(e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!("Endpoint returned no content");
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Asks the platform to start the given events now instead of waiting for `NotBefore`.
    ///
    /// An empty list sends nothing.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    pub async fn approve<I, S>(&self, event_ids: I) -> Result<(), FetchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let body = StartRequests::for_events(event_ids);
        if body.is_empty() {
            return Ok(());
        }
        tracing::info!(
            count = body.start_requests.len(),
            "Approving scheduled events"
        );
        self.send(self.client.post(&self.endpoint).json(&body))
            .await
            .map(drop)
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self) -> BoxFuture<'_, FetchResult> {
        self.get().boxed()
    }
}
