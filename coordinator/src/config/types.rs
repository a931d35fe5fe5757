//! Configuration data types for the coordinator.
//!
//! Every field has a default, so an empty (or absent) config file yields the
//! production setup against the Azure instance metadata service.

use core::time::Duration;
use std::{
    env,
    path::{Component, Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error as ThisError;

use crate::fetch::{DEFAULT_ENDPOINT, HttpFetcher};

/// File name of the role lock inside the temp directory.
pub const DEFAULT_LOCK_FILE: &str = "azure-scheduled-events.lock";
/// File name of the shared cache inside the temp directory.
pub const DEFAULT_CACHE_FILE: &str = "azure-scheduled-events-cache.json";

/// How a leader answers reads.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderReads {
    /// Always ask upstream, the leader never serves its own cache.
    #[default]
    Direct,
    /// Serve a fresh cache entry and only go upstream on a miss.
    PreferCache,
}

/// Root config structure for the coordinator.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Scheduled events URL polled by the leader and by cache-miss reads.
    pub endpoint: String,
    /// File carrying the host-wide role lock. Must be the same for all cooperating processes.
    pub lock_path: PathBuf,
    /// Shared cache file. Must be the same for all cooperating processes.
    pub cache_path: PathBuf,
    /// Delay between successful leader polls.
    pub http_poll_interval_secs: u64,
    /// Delay between a follower's attempts to take the lock.
    pub lock_check_interval_secs: u64,
    /// Maximum cache age served to followers.
    pub cache_expiry_secs: u64,
    /// Delay after a failed iteration of either loop.
    pub error_backoff_secs: u64,
    /// How long shutdown waits for the background loop before aborting it.
    pub shutdown_grace_secs: u64,
    /// Timeout for a single upstream request.
    pub request_timeout_secs: u64,
    pub leader_reads: LeaderReads,
    pub notice: NoticeConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let tmp = env::temp_dir();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            lock_path: tmp.join(DEFAULT_LOCK_FILE),
            cache_path: tmp.join(DEFAULT_CACHE_FILE),
            http_poll_interval_secs: 10,
            lock_check_interval_secs: 30,
            cache_expiry_secs: 30,
            error_backoff_secs: 30,
            shutdown_grace_secs: 5,
            request_timeout_secs: 5 * 60,
            leader_reads: LeaderReads::Direct,
            notice: NoticeConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    #[must_use]
    pub const fn http_poll_interval(&self) -> Duration {
        at_least_one_second(self.http_poll_interval_secs)
    }

    #[must_use]
    pub const fn lock_check_interval(&self) -> Duration {
        at_least_one_second(self.lock_check_interval_secs)
    }

    #[must_use]
    pub const fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    #[must_use]
    pub const fn error_backoff(&self) -> Duration {
        at_least_one_second(self.error_backoff_secs)
    }

    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builds the HTTP fetcher for the configured endpoint and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn http_fetcher(&self) -> Result<HttpFetcher, reqwest::Error> {
        HttpFetcher::new(self.endpoint.clone(), self.request_timeout())
    }

    /// Rejects intervals that would make a loop poll without pause.
    ///
    /// # Errors
    ///
    /// Returns the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("http_poll_interval_secs", self.http_poll_interval_secs),
            ("lock_check_interval_secs", self.lock_check_interval_secs),
            ("error_backoff_secs", self.error_backoff_secs),
            ("notice.check_interval_secs", self.notice.check_interval_secs),
        ];
        match intervals.into_iter().find(|&(_, secs)| secs == 0) {
            Some((key, _)) => Err(ConfigError::ZeroInterval(key)),
            None => Ok(()),
        }
    }

    /// Resolves relative lock and cache paths against the config file's directory.
    #[must_use]
    pub fn resolve_paths(mut self, config_path: &Path) -> Self {
        self.lock_path = resolve_config_relative_paths(config_path, &self.lock_path);
        self.cache_path = resolve_config_relative_paths(config_path, &self.cache_path);
        self
    }
}

/// Settings of the "maintenance is about to start" watcher.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NoticeConfig {
    /// Lead time before `NotBefore` at which an event counts as imminent.
    pub period_secs: u64,
    /// Delay between checks.
    pub check_interval_secs: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            period_secs: 5 * 60,
            check_interval_secs: 2,
        }
    }
}

impl NoticeConfig {
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        at_least_one_second(self.check_interval_secs)
    }
}

/// Loop delays are floored at one second so a zero in the config can never turn a loop
/// into a busy spin.
const fn at_least_one_second(secs: u64) -> Duration {
    Duration::from_secs(if secs == 0 { 1 } else { secs })
}

/// A config value that is syntactically fine but unusable.
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{0}` must be at least 1")]
    ZeroInterval(&'static str),
}

/// Resolves a path to an absolute one.
///
/// If the path is absolute, returns it as-is. If relative, joins it with the
/// config file's parent directory and normalizes the result to remove redundant
/// components like `./`.
pub fn resolve_config_relative_paths(config_path: &Path, relative_path: &Path) -> PathBuf {
    let resolved = if relative_path.is_absolute() {
        relative_path.to_path_buf()
    } else {
        config_path
            .parent()
            .map_or_else(|| relative_path.to_path_buf(), |d| d.join(relative_path))
    };

    // We can't use canonicalize() because the file might not exist yet
    normalize_path(&resolved)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        use Component as C;
        match component {
            C::Normal(c) => {
                result.push(c);
            }
            C::ParentDir => {
                result.pop();
            }
            C::CurDir => {}
            C::RootDir | C::Prefix(_) => {
                result.push(component);
            }
        }
    }
    result
}
