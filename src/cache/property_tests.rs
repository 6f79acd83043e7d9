//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check counter accuracy, TTL visibility and partition
//! isolation over arbitrary operation sequences.

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::cache::{CacheStore, Partition, SharedCache};

// == Test Configuration ==
const TEST_API_TTL: u64 = 300;
const TEST_RATE_LIMIT_TTL: u64 = 60;

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,64}".prop_map(|s| s)
}

fn valid_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,64}".prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::collection::vec("[a-z]{1,8}", 0..5).prop_map(|items| json!({ "items": items })),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Has { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Counters reflect exactly the operations performed; `has` never counts.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut store = CacheStore::new(TEST_API_TTL, TEST_RATE_LIMIT_TTL);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;
        let mut expected_sets: u64 = 0;
        let mut expected_deletes: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(Partition::Api, key, value, None);
                    expected_sets += 1;
                }
                CacheOp::Get { key } => match store.get(Partition::Api, &key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Has { key } => {
                    let _ = store.has(Partition::Api, &key);
                }
                CacheOp::Delete { key } => {
                    if store.delete(Partition::Api, &key) {
                        expected_deletes += 1;
                    }
                }
            }
        }

        let report = store.stats().api;
        prop_assert_eq!(report.counters.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(report.counters.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(report.counters.sets, expected_sets, "Sets mismatch");
        prop_assert_eq!(report.counters.deletes, expected_deletes, "Deletes mismatch");
        prop_assert_eq!(report.entries, store.len(Partition::Api), "Entry count mismatch");
    }

    // A value is visible before its TTL elapses and absent afterwards.
    #[test]
    fn prop_ttl_visibility(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl in 1u64..3_600,
        now in 0u64..1_000_000_000,
        offset in 0u64..3_600_000,
    ) {
        let mut store = CacheStore::new(TEST_API_TTL, TEST_RATE_LIMIT_TTL);
        store.set_at(Partition::Api, key.clone(), value.clone(), Some(ttl), now);

        let read_at = now + offset;
        let got = store.get_at(Partition::Api, &key, read_at);
        if offset < ttl * 1000 {
            prop_assert_eq!(got, Some(value));
        } else {
            prop_assert_eq!(got, None);
            prop_assert!(store.peek_stale(Partition::Api, &key).is_some());
        }
    }

    // Writes to one partition are never visible in the other.
    #[test]
    fn prop_partition_isolation(key in valid_key_strategy(), value in valid_value_strategy()) {
        let mut store = CacheStore::new(TEST_API_TTL, TEST_RATE_LIMIT_TTL);
        store.set(Partition::RateLimit, key.clone(), value, None);

        prop_assert!(!store.has(Partition::Api, &key));
        prop_assert!(store.has(Partition::RateLimit, &key));
    }

    // Sweeping never removes a fresh entry.
    #[test]
    fn prop_cleanup_keeps_fresh_entries(
        entries in prop::collection::vec((valid_key_strategy(), 1u64..100), 1..30),
        sweep_at in 0u64..200_000,
    ) {
        let mut store = CacheStore::new(TEST_API_TTL, TEST_RATE_LIMIT_TTL);
        for (key, ttl) in &entries {
            store.set_at(Partition::Api, key.clone(), json!(1), Some(*ttl), 0);
        }

        store.cleanup_expired_at(Partition::Api, 0, sweep_at);

        for (key, _) in &entries {
            if store.has_at(Partition::Api, key, sweep_at) {
                prop_assert!(store.peek_stale(Partition::Api, key).is_some());
            }
        }
        let fresh = entries
            .iter()
            .map(|(k, _)| k)
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .filter(|k| store.has_at(Partition::Api, k, sweep_at))
            .count();
        prop_assert_eq!(store.len(Partition::Api), fresh);
    }
}

// == Concurrent Access ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    // Concurrent tasks through the shared handle leave counters consistent.
    #[test]
    fn prop_concurrent_operation_correctness(
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = SharedCache::new(CacheStore::new(TEST_API_TTL, TEST_RATE_LIMIT_TTL));
            let mut handles = vec![];
            let mut reads: u64 = 0;

            for op in operations {
                if matches!(op, CacheOp::Get { .. }) {
                    reads += 1;
                }
                let cache = cache.clone();
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => cache.set(key, value, None).await,
                        CacheOp::Get { key } => {
                            let _ = cache.get(&key).await;
                        }
                        CacheOp::Has { key } => {
                            let _ = cache.has(&key).await;
                        }
                        CacheOp::Delete { key } => {
                            let _ = cache.delete(&key).await;
                        }
                    }
                }));
            }

            for handle in handles {
                handle.await.expect("Task should not panic");
            }

            let report = cache.stats().await.api;
            prop_assert_eq!(report.counters.hits + report.counters.misses, reads);
            prop_assert!(report.hit_rate >= 0.0 && report.hit_rate <= 1.0);
            Ok(())
        })?;
    }
}
