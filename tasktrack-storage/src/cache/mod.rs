//! Per-identity query cache for task reads.
//!
//! Results of listing queries are memoized for a fixed time-to-live under a
//! [`QueryKey`]. Keys cannot be built without an [`Identity`], so one
//! identity's entries are never reachable through another identity's key.
//!
//! # Entry lifecycle
//!
//! `Absent -> Fresh` when a computed value is inserted, `Fresh -> Stale` once
//! the TTL elapses, and `Stale -> Absent` on the next lookup, a sweep, or
//! capacity eviction. A lookup that finds a stale entry behaves exactly like a
//! miss.
//!
//! # Example
//!
//! ```ignore
//! let key = QueryKey::new(KeyMode::Parameterized, &identity, &TaskQuery::ListAll);
//! let read = cache
//!     .get_or_compute(&key, || async { store.list(&identity).await })
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::debug!(age_ms = read.age().as_millis() as u64, "served from cache");
//! }
//! ```
//!
//! [`Identity`]: tasktrack_core::Identity

pub mod key;
pub mod query_cache;
pub mod read;
pub mod stats;

pub use key::{KeyMode, QueryKey};
pub use query_cache::{CacheConfig, QueryCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use read::CacheRead;
pub use stats::CacheStats;
