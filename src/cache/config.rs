//! Query cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::QueryKind;

const DEFAULT_STALE_SECONDS: u64 = 60;
const DEFAULT_PERMISSION_STALE_SECONDS: u64 = 5 * 60;
const DEFAULT_MAX_ENTRIES: usize = 256;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a cached read is served before a refetch is allowed.
    pub default_stale_seconds: u64,
    /// Staleness window for the capability check.
    pub permission_stale_seconds: u64,
    /// Upper bound on cached keys; least recently used entries go first.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_stale_seconds: DEFAULT_STALE_SECONDS,
            permission_stale_seconds: DEFAULT_PERMISSION_STALE_SECONDS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            default_stale_seconds: settings.default_stale.as_secs(),
            permission_stale_seconds: settings.permission_stale.as_secs(),
            max_entries: settings.max_entries,
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self, kind: QueryKind) -> Duration {
        match kind {
            QueryKind::AdminCheck => Duration::from_secs(self.permission_stale_seconds),
            _ => Duration::from_secs(self.default_stale_seconds),
        }
    }

    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
