//! Property-Based Tests for the Query Cache
//!
//! **Property 1: Identity Isolation**
//! An entry computed under one identity's key is never returned for a lookup
//! under a different identity's key, in either key mode.
//!
//! **Property 2: Stable Reads Within TTL**
//! A lookup inside the TTL window returns the very value stored at insertion.
//!
//! **Property 3: Single Recompute After Expiry**
//! Once the TTL elapses, the next lookup recomputes exactly once and returns
//! the recomputed value.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tasktrack_core::{Identity, Priority, Status, TaskQuery};
use tasktrack_storage::{CacheConfig, KeyMode, QueryCache, QueryKey};

// ============================================================================
// TEST HELPERS
// ============================================================================

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime")
}

async fn compute_counted(
    cache: &QueryCache<Vec<String>>,
    key: &QueryKey,
    value: Vec<String>,
    calls: &AtomicUsize,
) -> Arc<Vec<String>> {
    cache
        .get_or_compute(key, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(value)
        })
        .await
        .map(|read| read.into_shared())
        .unwrap_or_else(|never| match never {})
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

fn identity_strategy() -> impl Strategy<Value = Identity> {
    "[a-z0-9]{1,12}".prop_filter_map("identity must parse", Identity::parse)
}

fn distinct_identities() -> impl Strategy<Value = (Identity, Identity)> {
    (identity_strategy(), identity_strategy()).prop_filter("identities must differ", |(a, b)| a != b)
}

fn query_strategy() -> impl Strategy<Value = TaskQuery> {
    prop_oneof![
        Just(TaskQuery::ListAll),
        (0i64..4).prop_filter_map("valid status", |n| Status::from_ordinal(n).map(TaskQuery::ByStatus)),
        (0i64..4).prop_filter_map("valid priority", |n| Priority::from_ordinal(n).map(TaskQuery::ByPriority)),
        "[A-Za-z ]{0,16}".prop_map(|text| TaskQuery::search_title(&text)),
    ]
}

fn key_mode_strategy() -> impl Strategy<Value = KeyMode> {
    prop_oneof![Just(KeyMode::Parameterized), Just(KeyMode::Legacy)]
}

fn result_set_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}", 0..6)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Identity Isolation**
    #[test]
    fn prop_identities_never_share_entries(
        (a, b) in distinct_identities(),
        query in query_strategy(),
        mode in key_mode_strategy(),
        value_a in result_set_strategy(),
        value_b in result_set_strategy(),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let cache = QueryCache::new(CacheConfig::default().with_key_mode(mode));
            let calls = AtomicUsize::new(0);

            let key_a = QueryKey::new(mode, &a, &query);
            let key_b = QueryKey::new(mode, &b, &query);
            prop_assert_ne!(&key_a, &key_b);

            compute_counted(&cache, &key_a, value_a.clone(), &calls).await;
            let got_b = compute_counted(&cache, &key_b, value_b.clone(), &calls).await;

            prop_assert_eq!(&*got_b, &value_b);
            prop_assert_eq!(calls.load(Ordering::SeqCst), 2);
            Ok(())
        })?;
    }

    /// **Property 2: Stable Reads Within TTL**
    #[test]
    fn prop_reads_within_ttl_are_identical(
        who in identity_strategy(),
        query in query_strategy(),
        stored in result_set_strategy(),
        replacement in result_set_strategy(),
        elapsed_secs in 0u64..300,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let cache = QueryCache::with_defaults();
            let calls = AtomicUsize::new(0);
            let key = cache.key_for(&who, &query);

            let first = compute_counted(&cache, &key, stored.clone(), &calls).await;
            tokio::time::advance(Duration::from_secs(elapsed_secs)).await;
            let second = compute_counted(&cache, &key, replacement, &calls).await;

            prop_assert!(Arc::ptr_eq(&first, &second));
            prop_assert_eq!(&*second, &stored);
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            Ok(())
        })?;
    }

    /// **Property 3: Single Recompute After Expiry**
    #[test]
    fn prop_expiry_triggers_one_recompute(
        who in identity_strategy(),
        query in query_strategy(),
        stored in result_set_strategy(),
        recomputed in result_set_strategy(),
        overshoot_secs in 0u64..3600,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let cache = QueryCache::with_defaults();
            let calls = AtomicUsize::new(0);
            let key = cache.key_for(&who, &query);

            compute_counted(&cache, &key, stored, &calls).await;
            tokio::time::advance(Duration::from_secs(300 + overshoot_secs)).await;

            let after = compute_counted(&cache, &key, recomputed.clone(), &calls).await;
            let again = compute_counted(&cache, &key, Vec::new(), &calls).await;

            prop_assert_eq!(&*after, &recomputed);
            prop_assert_eq!(&*again, &recomputed);
            prop_assert_eq!(calls.load(Ordering::SeqCst), 2);
            Ok(())
        })?;
    }
}
