//! Assembled instruction-text cache keyed by logical template name.

use super::BoundedStore;
use std::sync::Mutex;

/// Capacity-bound cache of assembled prompt text. No TTL: callers invalidate
/// with [`clear`](TemplateCache::clear) when the underlying template files
/// change.
pub struct TemplateCache {
    store: Mutex<BoundedStore<String>>,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Mutex::new(BoundedStore::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let store = self.store.lock().expect("template cache mutex poisoned");
        store.get(key).map(|e| e.value.clone())
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut store = self.store.lock().expect("template cache mutex poisoned");
        store.put(key.into(), value.into());
    }

    pub fn clear(&self) {
        self.store
            .lock()
            .expect("template cache mutex poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.store
            .lock()
            .expect("template cache mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Janitor hook: re-enforce capacity. Insert-path eviction keeps this a
    /// no-op in the common case.
    pub(crate) fn sweep_to_capacity(&self) -> usize {
        self.store
            .lock()
            .expect("template cache mutex poisoned")
            .shrink_to_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn put_get_clear_roundtrip() {
        let cache = TemplateCache::new(10);
        cache.put("moderation", "You are a moderation assistant.");
        assert_eq!(
            cache.get("moderation").as_deref(),
            Some("You are a moderation assistant.")
        );
        cache.clear();
        assert!(cache.get("moderation").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn over_capacity_insert_drops_oldest_template() {
        let cache = TemplateCache::new(2);
        cache.put("first", "a");
        std::thread::sleep(Duration::from_millis(2));
        cache.put("second", "b");
        std::thread::sleep(Duration::from_millis(2));
        cache.put("third", "c");
        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("third").as_deref(), Some("c"));
    }
}
