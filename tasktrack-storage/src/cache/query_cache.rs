//! TTL query cache.
//!
//! Entries live in a sharded [`DashMap`], so lookups for distinct keys do not
//! contend. No map guard is ever held across an `.await`: the compute future
//! runs with the cache unlocked and its result is inserted only after it
//! resolves successfully. Concurrent misses on one key may each compute; the
//! last insert wins.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tasktrack_core::Identity;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::key::{KeyMode, QueryKey};
use super::read::CacheRead;
use super::stats::{CacheCounters, CacheStats};

/// Default time-to-live for cached result sets.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default capacity bound.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Configuration for the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Absolute lifetime of an entry, measured from insertion.
    pub ttl: Duration,
    /// Maximum number of entries held at once.
    pub max_entries: usize,
    /// Whether query parameters are part of the key.
    pub key_mode: KeyMode,
    /// Drop an identity's entries after that identity writes.
    pub invalidate_on_write: bool,
    /// Background sweep interval. `None` leaves eviction purely lazy.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            key_mode: KeyMode::Parameterized,
            invalidate_on_write: false,
            sweep_interval: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    pub fn with_invalidate_on_write(mut self, enabled: bool) -> Self {
        self.invalidate_on_write = enabled;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    cached_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Per-identity memoization of read query results.
///
/// Constructed explicitly and shared by `Arc`; there is no global instance.
#[derive(Debug)]
pub struct QueryCache<V> {
    entries: DashMap<QueryKey, CacheEntry<V>>,
    config: CacheConfig,
    counters: CacheCounters,
}

impl<V> QueryCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            counters: CacheCounters::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Build a key for `query` using this cache's key mode.
    pub fn key_for(&self, identity: &Identity, query: &tasktrack_core::TaskQuery) -> QueryKey {
        QueryKey::new(self.config.key_mode, identity, query)
    }

    /// Return the live entry for `key`, or run `compute`, store its result
    /// and return it.
    ///
    /// A failed compute leaves the cache untouched and its error is returned
    /// as is. Misses are not errors.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &QueryKey,
        compute: F,
    ) -> Result<CacheRead<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(read) = self.lookup(key) {
            self.counters.hit();
            debug!(key = %key, "query cache hit");
            return Ok(read);
        }

        self.counters.miss();
        debug!(key = %key, "query cache miss");

        let value = Arc::new(compute().await?);
        Ok(self.insert(key.clone(), value))
    }

    /// Live value for `key`, without computing. Stale entries are removed.
    pub fn peek(&self, key: &QueryKey) -> Option<CacheRead<V>> {
        self.lookup(key)
    }

    fn lookup(&self, key: &QueryKey) -> Option<CacheRead<V>> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_live(now) {
                return Some(CacheRead::hit(
                    Arc::clone(&entry.value),
                    entry.cached_at,
                    entry.expires_at,
                ));
            }
        }

        // Stale. Remove only if it is still stale: a concurrent insert may
        // have replaced it with a live entry since the guard was dropped.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_live(now))
            .is_some()
        {
            self.counters.expired(1);
            trace!(key = %key, "expired entry removed on lookup");
        }
        None
    }

    fn insert(&self, key: QueryKey, value: Arc<V>) -> CacheRead<V> {
        let cached_at = Instant::now();
        let expires_at = cached_at + self.config.ttl;

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.make_room(cached_at);
        }

        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                cached_at,
                expires_at,
            },
        );
        self.counters.insert();
        CacheRead::computed(value, cached_at, expires_at)
    }

    /// Free at least one slot: purge stale entries first, then evict the
    /// entry closest to expiry. Readers holding its value keep their `Arc`.
    fn make_room(&self, now: Instant) {
        if self.purge_stale_at(now) > 0 && self.entries.len() < self.config.max_entries {
            return;
        }

        while self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().expires_at)
                .map(|entry| (entry.key().clone(), entry.value().expires_at));

            let Some((key, expires_at)) = oldest else {
                break;
            };
            if self
                .entries
                .remove_if(&key, |_, entry| entry.expires_at == expires_at)
                .is_some()
            {
                self.counters.evicted(1);
                debug!(key = %key, "query cache entry evicted for capacity");
            }
        }
    }

    fn purge_stale_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.counters.expired(removed as u64);
        }
        removed
    }

    /// Remove every stale entry. Live entries are never touched.
    pub fn purge_expired(&self) -> usize {
        self.purge_stale_at(Instant::now())
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.counters.invalidated(1);
        }
        removed
    }

    /// Drop every entry belonging to `identity`. Returns how many were removed.
    pub fn invalidate_identity(&self, identity: &Identity) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.belongs_to(identity));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.counters.invalidated(removed as u64);
            debug!(identity = %identity, removed, "query cache invalidated for identity");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }

    /// Spawn a background task that purges stale entries every `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, "query cache sweep");
                }
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
