//! Property-Based Tests for the Response Cache
//!
//! **Scope isolation**: for any two distinct scopes, values stored under the
//! same resource key never shadow each other.
//!
//! **Capacity bound**: for any insertion sequence and capacity `n > 0`, the
//! cache never holds more than `n` entries, and the survivors are exactly the
//! `n` most recently inserted distinct keys.

use std::collections::HashSet;
use std::time::Duration;

use fleet_storage::{CacheConfig, ResponseCache};
use fleet_test_utils::{arb_resource_key, arb_scope_key};
use proptest::prelude::*;

fn cache(max_entries: usize) -> ResponseCache<String> {
    ResponseCache::new(
        CacheConfig::new()
            .with_ttl(Duration::from_secs(3600))
            .with_max_entries(max_entries),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_scopes_never_collide(
        a in arb_scope_key(),
        b in arb_scope_key(),
        key in arb_resource_key(),
    ) {
        prop_assume!(a != b);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let cache = cache(0);
            cache.set(&a, key.clone(), format!("{}-value", a));
            cache.set(&b, key.clone(), format!("{}-value", b));

            prop_assert_eq!(cache.get(&a, &key), Some(format!("{}-value", a)));
            prop_assert_eq!(cache.get(&b, &key), Some(format!("{}-value", b)));

            cache.delete(&a, &key);
            prop_assert_eq!(cache.get(&a, &key), None);
            prop_assert_eq!(cache.get(&b, &key), Some(format!("{}-value", b)));
            Ok(())
        })?;
    }

    #[test]
    fn prop_capacity_keeps_newest_distinct_keys(
        capacity in 1usize..8,
        keys in prop::collection::vec("[a-e]{1,2}", 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let cache = cache(capacity);
            let scope = fleet_core::ScopeKey::new("prod");
            for key in &keys {
                cache.set(&scope, key.clone(), key.clone());
                prop_assert!(cache.len() <= capacity);
            }

            // Newest distinct keys, most recent first.
            let mut expected = Vec::new();
            let mut seen = HashSet::new();
            for key in keys.iter().rev() {
                if seen.insert(key.clone()) {
                    expected.push(key.clone());
                }
            }
            expected.truncate(capacity);

            for key in &expected {
                prop_assert_eq!(cache.get(&scope, key), Some(key.clone()));
            }
            prop_assert_eq!(cache.len(), expected.len());
            Ok(())
        })?;
    }
}
