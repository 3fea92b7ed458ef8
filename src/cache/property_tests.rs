//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the table invariants over random operation
//! sequences, plus a concurrent run against the async handle.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::removal::{RemovalCause, RemovalNotification};
use crate::cache::store::{CacheStore, Lookup};
use crate::cache::Cache;
use crate::config::CacheConfig;

// == Test Configuration ==
const TEST_MAX_ENTRIES: u64 = 100;

type Removed = Vec<RemovalNotification<String, String>>;

fn store(maximum_size: u64) -> CacheStore<String, String> {
    CacheStore::new(CacheConfig {
        maximum_size,
        ..CacheConfig::default()
    })
}

fn read(store: &mut CacheStore<String, String>, key: &str, now: Instant) -> Option<String> {
    match store.get(&key.to_string(), now, &mut Vec::new()) {
        Lookup::Hit { value, .. } => Some(value),
        _ => None,
    }
}

// == Strategies ==
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,16}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}"
}

/// Distinct keys, in generation order
fn unique_keys(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key_strategy(), min..max).prop_map(|keys| {
        let mut seen = HashSet::new();
        keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
    })
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so operations collide
    let key = "[a-e]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property 1: Round-trip**
    // A value put under a key is returned by the next read of that key.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let mut store = store(TEST_MAX_ENTRIES);
        let now = Instant::now();

        prop_assert_eq!(read(&mut store, &key, now), None);

        let mut removed = Vec::new();
        store.insert(key.clone(), value.clone(), now, &mut removed);

        prop_assert!(removed.is_empty());
        prop_assert_eq!(read(&mut store, &key, now), Some(value));
    }

    // **Property 2: Overwrite**
    // A second put replaces the value and reports the first as Replaced.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let mut store = store(TEST_MAX_ENTRIES);
        let now = Instant::now();
        let mut removed: Removed = Vec::new();

        store.insert(key.clone(), value1.clone(), now, &mut removed);
        store.insert(key.clone(), value2.clone(), now, &mut removed);

        prop_assert_eq!(
            removed,
            vec![RemovalNotification::new(key.clone(), value1, RemovalCause::Replaced)]
        );
        prop_assert_eq!(read(&mut store, &key, now), Some(value2));
        prop_assert_eq!(store.len(), 1);
    }

    // **Property 3: Invalidate is idempotent**
    // Invalidating twice yields one Explicit notification, then nothing.
    #[test]
    fn prop_invalidate_idempotent(key in key_strategy(), value in value_strategy()) {
        let mut store = store(TEST_MAX_ENTRIES);
        let now = Instant::now();
        store.insert(key.clone(), value, now, &mut Vec::new());

        let mut removed: Removed = Vec::new();
        prop_assert!(store.remove(&key, &mut removed));
        prop_assert!(!store.remove(&key, &mut removed));

        prop_assert_eq!(removed.len(), 1);
        prop_assert_eq!(removed[0].cause, RemovalCause::Explicit);
        prop_assert_eq!(read(&mut store, &key, now), None);
    }

    // **Property 4: Capacity bound**
    // After any put the number of entries never exceeds the maximum size,
    // and every entry pushed out is reported with cause Size.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 1..200),
        maximum_size in 0u64..50
    ) {
        let mut store = store(maximum_size);
        let now = Instant::now();
        let mut evicted = 0u64;

        for (key, value) in entries {
            let mut removed: Removed = Vec::new();
            store.insert(key, value, now, &mut removed);
            evicted += removed.iter().filter(|n| n.cause == RemovalCause::Size).count() as u64;

            prop_assert!(
                store.len() as u64 <= maximum_size,
                "Cache size {} exceeds max {}",
                store.len(),
                maximum_size
            );
        }

        prop_assert_eq!(store.stats().evictions, evicted);
    }

    // **Property 5: Statistics accuracy**
    // Hits and misses match what the reads observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut store = store(3);
        let now = Instant::now();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => store.insert(key, value, now, &mut Vec::new()),
                CacheOp::Get { key } => match read(&mut store, &key, now) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Invalidate { key } => {
                    store.remove(&key, &mut Vec::new());
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, store.len(), "Total entries mismatch");
    }

    // **Property 6: Clear reports every entry**
    // invalidate_all yields one Explicit notification per live entry.
    #[test]
    fn prop_clear_notifies_every_entry(keys in unique_keys(1, 30)) {
        let mut store = store(TEST_MAX_ENTRIES);
        let now = Instant::now();
        for key in &keys {
            store.insert(key.clone(), format!("value_{}", key), now, &mut Vec::new());
        }

        let mut removed: Removed = Vec::new();
        prop_assert_eq!(store.clear(&mut removed), keys.len());

        let notified: HashSet<String> = removed.iter().map(|n| n.key.clone()).collect();
        prop_assert_eq!(notified, keys.iter().cloned().collect::<HashSet<_>>());
        prop_assert!(removed.iter().all(|n| n.cause == RemovalCause::Explicit));
        prop_assert_eq!(store.len(), 0);
    }
}

// Property tests for LRU eviction behavior
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property 7: LRU eviction order**
    // Filling the cache and adding one more key evicts the oldest key,
    // and only that key.
    #[test]
    fn prop_lru_eviction_order(keys in unique_keys(3, 10), new_key in key_strategy()) {
        prop_assume!(keys.len() >= 2);
        prop_assume!(!keys.contains(&new_key));

        let capacity = keys.len() as u64;
        let mut store = store(capacity);
        let now = Instant::now();
        for key in &keys {
            store.insert(key.clone(), format!("value_{}", key), now, &mut Vec::new());
        }

        let mut removed: Removed = Vec::new();
        store.insert(new_key.clone(), "new".to_string(), now, &mut removed);

        prop_assert_eq!(
            removed,
            vec![RemovalNotification::new(
                keys[0].clone(),
                format!("value_{}", keys[0]),
                RemovalCause::Size
            )]
        );
        prop_assert_eq!(store.len() as u64, capacity);
        for key in keys.iter().skip(1) {
            prop_assert!(store.contains_key(key, now), "Key '{}' should survive", key);
        }
        prop_assert!(store.contains_key(&new_key, now));
    }

    // **Property 8: LRU access tracking**
    // Reading the oldest key makes the second oldest the next victim.
    #[test]
    fn prop_lru_access_tracking(keys in unique_keys(3, 8), new_key in key_strategy()) {
        prop_assume!(keys.len() >= 3);
        prop_assume!(!keys.contains(&new_key));

        let mut store = store(keys.len() as u64);
        let now = Instant::now();
        for key in &keys {
            store.insert(key.clone(), format!("value_{}", key), now, &mut Vec::new());
        }

        prop_assert!(read(&mut store, &keys[0], now).is_some());

        let mut removed: Removed = Vec::new();
        store.insert(new_key.clone(), "new".to_string(), now, &mut removed);

        prop_assert_eq!(removed.len(), 1);
        prop_assert_eq!(&removed[0].key, &keys[1]);
        prop_assert!(store.contains_key(&keys[0], now));
    }
}

// Expiry checks use synthetic instants, so no real waiting is needed
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // **Property 9: Write expiry boundary**
    // An entry is readable strictly before its write age reaches the limit
    // and expired from that instant on.
    #[test]
    fn prop_write_expiry_boundary(
        key in key_strategy(),
        value in value_strategy(),
        ttl_ms in 1u64..10_000
    ) {
        let ttl = Duration::from_millis(ttl_ms);
        let mut store: CacheStore<String, String> = CacheStore::new(CacheConfig {
            expire_after_write: Some(ttl),
            ..CacheConfig::default()
        });
        let start = Instant::now();
        store.insert(key.clone(), value.clone(), start, &mut Vec::new());

        let just_before = start + ttl - Duration::from_millis(1);
        prop_assert_eq!(read(&mut store, &key, just_before), Some(value));

        let mut removed: Removed = Vec::new();
        prop_assert!(matches!(
            store.get(&key, start + ttl, &mut removed),
            Lookup::Miss
        ));
        prop_assert_eq!(removed.len(), 1);
        prop_assert_eq!(removed[0].cause, RemovalCause::Expired);
    }
}

// == Property Test for Concurrent Operation Correctness ==
// Many tasks share one cache handle

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    // **Property 10: Concurrent operation correctness**
    // Concurrent puts, reads and invalidations leave the cache within its
    // bound, and every value read is one that was put for that key.
    #[test]
    fn prop_concurrent_operation_correctness(
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache: Cache<String, String> = Cache::builder().maximum_size(3).build().unwrap();

            let written: HashSet<(String, String)> = operations
                .iter()
                .filter_map(|op| match op {
                    CacheOp::Put { key, value } => Some((key.clone(), value.clone())),
                    _ => None,
                })
                .collect();

            let mut handles = vec![];
            for op in operations {
                let cache = cache.clone();
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Put { key, value } => {
                            cache.put(key, value).await;
                            None
                        }
                        CacheOp::Get { key } => {
                            cache.get_if_present(&key).await.map(|value| (key, value))
                        }
                        CacheOp::Invalidate { key } => {
                            cache.invalidate(&key).await;
                            None
                        }
                    }
                }));
            }

            for handle in handles {
                if let Some(pair) = handle.await.expect("Task should not panic") {
                    prop_assert!(written.contains(&pair), "Read unexpected pair {:?}", pair);
                }
            }

            let stats = cache.stats().await;
            prop_assert!(stats.total_entries <= 3, "Cache should not exceed max entries");
            let hit_rate = stats.hit_rate();
            prop_assert!((0.0..=1.0).contains(&hit_rate), "Hit rate out of range: {}", hit_rate);

            Ok(())
        })?;
    }
}
