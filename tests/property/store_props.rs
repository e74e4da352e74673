//! Properties of the bounded in-memory store.

use proptest::prelude::*;
use std::time::{Duration, UNIX_EPOCH};
use tower_edgeguard_ratelimit::{MemoryStore, RateLimitStore};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// The store never exceeds its key bound, whatever the key stream.
    #[test]
    fn key_count_never_exceeds_max_keys(
        max_keys in 1usize..=25,
        keys in prop::collection::vec(0u16..200, 1..300),
    ) {
        let store = MemoryStore::new(max_keys);
        for (i, key) in keys.iter().enumerate() {
            store
                .add_request(&format!("k{key}"), UNIX_EPOCH + Duration::from_secs(i as u64))
                .unwrap();
            prop_assert!(store.key_count() <= max_keys);
        }
    }

    /// The key just touched is never the eviction victim.
    #[test]
    fn most_recent_key_survives_its_own_insert(
        max_keys in 2usize..=20,
        keys in prop::collection::vec(0u16..100, 1..200),
    ) {
        let store = MemoryStore::new(max_keys);
        for (i, key) in keys.iter().enumerate() {
            let key = format!("k{key}");
            store
                .add_request(&key, UNIX_EPOCH + Duration::from_secs(i as u64))
                .unwrap();
            prop_assert!(
                store.request_count(&key, UNIX_EPOCH).unwrap() >= 1,
                "freshly touched key {key} was evicted"
            );
        }
    }

    /// Cleanup never leaves an empty key behind, and never drops a
    /// live event.
    #[test]
    fn cleanup_is_exact(
        mut events in prop::collection::vec((0u8..10, 1u64..200), 1..100),
        cutoff_secs in 1u64..200,
    ) {
        // Appends arrive in timestamp order per key, as the skew guard
        // guarantees in production.
        events.sort_by_key(|(_, at)| *at);
        let store = MemoryStore::new(1_000);
        for (key, at) in &events {
            store
                .add_request(&format!("k{key}"), UNIX_EPOCH + Duration::from_secs(*at))
                .unwrap();
        }

        let cutoff = UNIX_EPOCH + Duration::from_secs(cutoff_secs);
        store.cleanup(cutoff).unwrap();

        for key in 0u8..10 {
            let expected = events
                .iter()
                .filter(|(k, at)| *k == key && *at > cutoff_secs)
                .count();
            prop_assert_eq!(
                store.request_count(&format!("k{key}"), cutoff).unwrap(),
                expected
            );
        }

        let live_keys = (0u8..10)
            .filter(|key| events.iter().any(|(k, at)| k == key && *at > cutoff_secs))
            .count();
        prop_assert_eq!(store.key_count(), live_keys);
    }

    /// Memory accounting moves with the data it models.
    #[test]
    fn memory_usage_shrinks_after_cleanup(
        events in prop::collection::vec((0u8..5, 1u64..100), 1..50),
    ) {
        let store = MemoryStore::new(1_000);
        for (key, at) in &events {
            store
                .add_request(&format!("k{key}"), UNIX_EPOCH + Duration::from_secs(*at))
                .unwrap();
        }

        let before = store.memory_usage();
        store.cleanup(UNIX_EPOCH + Duration::from_secs(200)).unwrap();
        prop_assert!(before > 0);
        prop_assert_eq!(store.memory_usage(), 0);
    }
}
