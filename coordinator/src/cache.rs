//! Shared, host-local cache of the last notification document.
//!
//! The cache is a single JSON file. Freshness comes from the file's modification time,
//! not its content. Every failure is reported to the event sink and treated as "no
//! cached value"; nothing here ever returns an error to the polling loops.

use alloc::sync::Arc;
use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
    process,
    time::SystemTime,
};

use scheduled_events_common::NotificationDocument;

use crate::events::{CoordinatorEvent, EventSink};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// The leader's last poll returned no content.
    Empty,
    Document(NotificationDocument),
}

impl CacheEntry {
    #[must_use]
    pub fn into_document(self) -> Option<NotificationDocument> {
        match self {
            Self::Empty => None,
            Self::Document(document) => Some(document),
        }
    }
}

/// Whether an entry of the given age is past the freshness window. The boundary itself is expired.
#[must_use]
pub fn is_expired(age: Duration, expiry: Duration) -> bool {
    age >= expiry
}

pub struct CacheStore {
    path: PathBuf,
    expiry: Duration,
    sink: Arc<dyn EventSink>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, expiry: Duration, sink: Arc<dyn EventSink>) -> Self {
        Self {
            path: path.into(),
            expiry,
            sink,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the cache content. `None` writes the explicit "no content" marker.
    ///
    /// Best effort: failures are reported and otherwise ignored.
    pub fn write(&self, document: Option<&NotificationDocument>) {
        if let Err(e) = self.try_write(document) {
            self.sink.on_event(&CoordinatorEvent::CacheWriteFailed {
                error: format!("{}: {e}", self.path.display()),
            });
        }
    }

    fn try_write(&self, document: Option<&NotificationDocument>) -> io::Result<()> {
        // `None` serializes as `null`, which is distinguishable from an empty or corrupt file.
        let bytes = serde_json::to_vec(&document)?;
        let tmp = self.temp_path();
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path).inspect_err(|_| {
            drop(fs::remove_file(&tmp));
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        name.push(format!(
            ".{}.{}.tmp",
            process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        self.path.with_file_name(name)
    }

    /// Returns the cached entry if the file exists, is younger than the expiry and parses.
    #[must_use]
    pub fn read(&self) -> Option<CacheEntry> {
        let modified = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                self.read_failed(&e);
                return None;
            }
        };
        // A timestamp in the future (clock step) counts as just written.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if is_expired(age, self.expiry) {
            self.sink.on_event(&CoordinatorEvent::CacheExpired { age });
            return None;
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                self.read_failed(&e);
                return None;
            }
        };
        match serde_json::from_slice::<Option<NotificationDocument>>(&bytes) {
            Ok(Some(document)) => Some(CacheEntry::Document(document)),
            Ok(None) => Some(CacheEntry::Empty),
            Err(e) => {
                self.read_failed(&e);
                None
            }
        }
    }

    fn read_failed(&self, error: &dyn core::error::Error) {
        self.sink.on_event(&CoordinatorEvent::CacheReadFailed {
            error: format!("{}: {error}", self.path.display()),
        });
    }

    /// Deletes the cache file. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
