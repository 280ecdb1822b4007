//! Cache read results carrying hit/miss metadata.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Result of [`QueryCache::get_or_compute`], carrying where the value came
/// from and how old it is.
///
/// [`QueryCache::get_or_compute`]: super::QueryCache::get_or_compute
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: Arc<T>,
    cached_at: Instant,
    expires_at: Instant,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    pub(crate) fn hit(value: Arc<T>, cached_at: Instant, expires_at: Instant) -> Self {
        Self {
            value,
            cached_at,
            expires_at,
            was_cache_hit: true,
        }
    }

    pub(crate) fn computed(value: Arc<T>, cached_at: Instant, expires_at: Instant) -> Self {
        Self {
            value,
            cached_at,
            expires_at,
            was_cache_hit: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Shared handle to the value. The same allocation is handed to every
    /// reader until the entry is replaced.
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    pub fn into_shared(self) -> Arc<T> {
        self.value
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Time since the value was computed.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.cached_at)
    }

    /// Time left before the entry goes stale.
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

impl<T: Clone> CacheRead<T> {
    /// Clone the value out of the shared handle.
    pub fn into_value(self) -> T {
        Arc::try_unwrap(self.value).unwrap_or_else(|shared| (*shared).clone())
    }
}
