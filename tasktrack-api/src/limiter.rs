//! Admission Limiter
//!
//! Per-identity token buckets plus one shared fixed window for anonymous
//! callers. Rejected requests are never queued; the caller gets a
//! [`Admission::Rejected`] with the time until a permit frees up.
//!
//! Buckets are governor GCRA limiters, which is a token bucket with capacity
//! equal to the burst size and one permit replenished per refill period.
//! The limiter is generic over governor's [`Clock`] so tests can drive it
//! with a `FakeRelativeClock`.

use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tasktrack_core::Identity;

/// Per-identity bucket capacity.
pub const DEFAULT_CAPACITY: u32 = 5;

/// One permit is replenished per period.
pub const DEFAULT_REFILL_PERIOD: Duration = Duration::from_secs(60);

/// Anonymous callers share this many permits per window.
pub const DEFAULT_ANONYMOUS_PERMITS: u32 = 5;

pub const DEFAULT_ANONYMOUS_WINDOW: Duration = Duration::from_secs(60);

/// A direct limiter on clock `C`. The middleware parameter is spelled out
/// because governor's default is tied to its quanta clock.
type Bucket<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Admission limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Whether admission control is applied at all.
    pub enabled: bool,

    /// Burst size of each per-identity bucket.
    pub capacity: u32,

    /// Time to replenish one permit in a per-identity bucket.
    pub refill_period: Duration,

    /// Permits per anonymous window.
    pub anonymous_permits: u32,

    /// Length of the anonymous fixed window.
    pub anonymous_window: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            refill_period: DEFAULT_REFILL_PERIOD,
            anonymous_permits: DEFAULT_ANONYMOUS_PERMITS,
            anonymous_window: DEFAULT_ANONYMOUS_WINDOW,
        }
    }
}

impl LimiterConfig {
    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.capacity).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(self.refill_period)
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
            .allow_burst(burst)
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Who is asking for admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    Identified(Identity),
    Anonymous,
}

impl Caller {
    pub fn as_label(&self) -> &str {
        match self {
            Caller::Identified(identity) => identity.as_str(),
            Caller::Anonymous => "anonymous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Whole seconds to wait before retrying, at least 1. `None` when allowed.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Admission::Allowed => None,
            Admission::Rejected { retry_after } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
        }
    }
}

/// Snapshot of limiter activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub allowed: u64,
    pub rejected: u64,
    pub tracked_identities: u64,
}

// ============================================================================
// LIMITER
// ============================================================================

#[derive(Debug)]
struct FixedWindow<I> {
    started: Option<I>,
    used: u32,
}

/// Admission control shared by all requests.
pub struct AdmissionLimiter<C: Clock = DefaultClock> {
    config: LimiterConfig,
    quota: Quota,
    clock: C,
    /// Per-identity buckets - DashMap so distinct identities never contend
    buckets: DashMap<Identity, Arc<Bucket<C>>>,
    anonymous: Mutex<FixedWindow<C::Instant>>,
    allowed: AtomicU64,
    rejected: AtomicU64,
}

impl AdmissionLimiter<DefaultClock> {
    pub fn new(config: LimiterConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C> AdmissionLimiter<C>
where
    C: Clock + Clone,
{
    pub fn with_clock(config: LimiterConfig, clock: C) -> Self {
        let quota = config.quota();
        Self {
            config,
            quota,
            clock,
            buckets: DashMap::new(),
            anonymous: Mutex::new(FixedWindow {
                started: None,
                used: 0,
            }),
            allowed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Consume one permit for `caller` if available.
    pub fn admit(&self, caller: &Caller) -> Admission {
        if !self.config.enabled {
            return Admission::Allowed;
        }

        let admission = match caller {
            Caller::Identified(identity) => self.admit_identity(identity),
            Caller::Anonymous => self.admit_anonymous(),
        };

        match admission {
            Admission::Allowed => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
            }
            Admission::Rejected { retry_after } => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    caller = caller.as_label(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Request rejected by admission limiter"
                );
            }
        }
        admission
    }

    /// Get or create the bucket for `identity`.
    fn bucket(&self, identity: &Identity) -> Arc<Bucket<C>> {
        // DashMap's entry API handles the get-or-insert atomically
        self.buckets
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(RateLimiter::direct_with_clock(self.quota, self.clock.clone())))
            .clone()
    }

    fn admit_identity(&self, identity: &Identity) -> Admission {
        // Shard guard is released before the bucket is checked
        let bucket = self.bucket(identity);
        match bucket.check() {
            Ok(()) => Admission::Allowed,
            Err(not_until) => Admission::Rejected {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }

    fn admit_anonymous(&self) -> Admission {
        let now = self.clock.now();
        let window_len = self.config.anonymous_window;

        // A panic while holding the lock cannot leave the window inconsistent
        let mut window = self
            .anonymous
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let elapsed = window
            .started
            .map(|started| Duration::from(now.duration_since(started)));

        let elapsed = match elapsed {
            Some(elapsed) if elapsed < window_len => elapsed,
            _ => {
                window.started = Some(now);
                window.used = 0;
                Duration::ZERO
            }
        };

        if window.used < self.config.anonymous_permits {
            window.used += 1;
            Admission::Allowed
        } else {
            Admission::Rejected {
                retry_after: window_len.saturating_sub(elapsed),
            }
        }
    }

    /// Number of identities with a bucket.
    pub fn tracked_identities(&self) -> usize {
        self.buckets.len()
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            allowed: self.allowed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            tracked_identities: self.buckets.len() as u64,
        }
    }
}

impl<C: Clock> std::fmt::Debug for AdmissionLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionLimiter")
            .field("config", &self.config)
            .field("tracked_identities", &self.buckets.len())
            .finish_non_exhaustive()
    }
}
