//! TaskTrack Storage - Task Store Trait, In-Memory Store and Query Cache
//!
//! Defines the persistence capability the rest of the service consumes
//! ([`TaskStore`]), a unit-of-work in-memory implementation used for
//! development and tests, and the per-identity [`QueryCache`] that sits in
//! front of task reads.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{CacheConfig, CacheRead, CacheStats, KeyMode, QueryCache, QueryKey};
pub use memory::InMemoryTaskStore;
pub use store::TaskStore;
