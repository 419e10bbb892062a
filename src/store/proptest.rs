//! Property-Based Tests for the LRU Cache
//!
//! Replays random operation sequences against both the cache and a naive
//! recency-ordered model.
//!
//! # Test Properties
//!
//! 1. **Bounded Size**: the cache never holds more than `capacity` entries
//! 2. **LRU Victim**: the evicted key is always the least recently touched one
//! 3. **Update Stability**: re-putting a present key never evicts

#![cfg(test)]

use bytes::Bytes;
use proptest::prelude::*;

use super::{Evicted, LruCache};

#[derive(Debug, Clone)]
enum CacheOp {
    Get(u8),
    Put(u8, u8),
    Delete(u8),
}

fn op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so hits, updates and evictions all occur
    prop_oneof![
        (0u8..16).prop_map(CacheOp::Get),
        (0u8..16, any::<u8>()).prop_map(|(k, v)| CacheOp::Put(k, v)),
        (0u8..16).prop_map(CacheOp::Delete),
    ]
}

/// Most recently used first
#[derive(Default)]
struct Model {
    entries: Vec<(u8, u8)>,
}

impl Model {
    fn position(&self, key: u8) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }

    fn get(&mut self, key: u8) -> Option<u8> {
        let pos = self.position(key)?;
        let entry = self.entries.remove(pos);
        self.entries.insert(0, entry);
        Some(entry.1)
    }

    fn put(&mut self, key: u8, value: u8, capacity: usize) -> Option<(u8, u8)> {
        if let Some(pos) = self.position(key) {
            self.entries.remove(pos);
            self.entries.insert(0, (key, value));
            return None;
        }
        self.entries.insert(0, (key, value));
        if self.entries.len() > capacity {
            self.entries.pop()
        } else {
            None
        }
    }

    fn delete(&mut self, key: u8) -> bool {
        match self.position(key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }
}

fn key(k: u8) -> Bytes {
    Bytes::from(vec![k])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the cache matches the model on every operation.
    #[test]
    fn prop_matches_recency_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let cache = LruCache::new(capacity)?;
        let mut model = Model::default();

        for op in ops {
            match op {
                CacheOp::Get(k) => {
                    let expected = model.get(k).map(|v| Bytes::from(vec![v]));
                    prop_assert_eq!(cache.get(&[k]), expected);
                }
                CacheOp::Put(k, v) => {
                    let was_present = model.position(k).is_some();
                    let expected = model
                        .put(k, v, capacity)
                        .map(|(ek, ev)| Evicted { key: key(ek), value: Bytes::from(vec![ev]) });
                    let evicted = cache.put(key(k), Bytes::from(vec![v]));
                    if was_present {
                        prop_assert!(evicted.is_none());
                    }
                    prop_assert_eq!(evicted, expected);
                }
                CacheOp::Delete(k) => {
                    prop_assert_eq!(cache.delete(&[k]), model.delete(k));
                }
            }

            prop_assert!(cache.len() <= capacity);
            let expected_keys: Vec<Bytes> = model.entries.iter().map(|(k, _)| key(*k)).collect();
            prop_assert_eq!(cache.keys(), expected_keys);
        }
    }
}
