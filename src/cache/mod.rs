//! Capacity-bound in-memory caches.
//!
//! Both caches share one eviction policy: insertion beyond capacity removes
//! the single oldest-*inserted* entry first. Access order is deliberately
//! ignored; a hot entry still ages out once enough newer keys arrive.
//!
//! | Cache | TTL | Default capacity |
//! |-------|-----|------------------|
//! | [`TemplateCache`] | none | 50 |
//! | [`EphemeralCache`] | 300 s | 25 |

mod ephemeral;
mod template;

pub use ephemeral::EphemeralCache;
pub use template::TemplateCache;

use std::collections::HashMap;
use std::time::Instant;

pub(crate) struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
}

/// Insertion-order bounded map shared by both cache flavors.
pub(crate) struct BoundedStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
    capacity: usize,
}

impl<T> BoundedStore<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.remove(key)
    }

    /// Insert, evicting the oldest-inserted entry first when at capacity.
    /// Re-inserting an existing key refreshes its timestamp without eviction.
    pub fn put(&mut self, key: String, value: T) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.inserted_at)
            .map(|(k, _)| k.clone());
        if let Some(k) = oldest {
            self.entries.remove(&k);
        }
    }

    /// Remove oldest entries until the store is back within capacity.
    /// Returns the number of evictions.
    pub fn shrink_to_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.evict_oldest();
            evicted += 1;
        }
        evicted
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&CacheEntry<T>) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| keep(e));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn capacity_plus_one_evicts_single_oldest() {
        let mut store = BoundedStore::new(3);
        for i in 0..4 {
            store.put(format!("k{i}"), i);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(store.len(), 3);
        assert!(!store.contains("k0"));
        assert!(store.contains("k1"));
        assert!(store.contains("k3"));
    }

    #[test]
    fn access_does_not_affect_eviction_order() {
        let mut store = BoundedStore::new(2);
        store.put("a".into(), 1);
        std::thread::sleep(Duration::from_millis(2));
        store.put("b".into(), 2);
        // Reading "a" must not save it: eviction is insertion-order.
        let _ = store.get("a");
        std::thread::sleep(Duration::from_millis(2));
        store.put("c".into(), 3);
        assert!(!store.contains("a"));
        assert!(store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn reinsert_refreshes_without_eviction() {
        let mut store = BoundedStore::new(2);
        store.put("a".into(), 1);
        std::thread::sleep(Duration::from_millis(2));
        store.put("b".into(), 2);
        std::thread::sleep(Duration::from_millis(2));
        store.put("a".into(), 10);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").map(|e| e.value), Some(10));
        // "b" is now the oldest.
        std::thread::sleep(Duration::from_millis(2));
        store.put("c".into(), 3);
        assert!(!store.contains("b"));
    }
}
