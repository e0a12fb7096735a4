//! Short-TTL cache of previously assembled request bodies.
//!
//! Avoids rebuilding an identical structure (e.g. a per-user moderation
//! prompt) within a small time window. Entries expire by age even when the
//! janitor has not swept yet; `get` treats them as absent and removes them.

use super::BoundedStore;
use std::sync::Mutex;
use std::time::Duration;

pub struct EphemeralCache {
    store: Mutex<BoundedStore<serde_json::Value>>,
    ttl: Duration,
}

impl EphemeralCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            store: Mutex::new(BoundedStore::new(capacity)),
            ttl,
        }
    }

    /// Compose the conventional cache key for a per-user logical prompt.
    pub fn user_key(user_id: &str, prompt_name: &str) -> String {
        format!("{user_id}:{prompt_name}")
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut store = self.store.lock().expect("ephemeral cache mutex poisoned");
        if let Some(entry) = store.get(key) {
            if entry.inserted_at.elapsed() <= self.ttl {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }
        // Expired: lazily remove so capacity is freed before any sweep.
        store.remove(key);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut store = self.store.lock().expect("ephemeral cache mutex poisoned");
        store.put(key.into(), value);
    }

    pub fn clear(&self) {
        self.store
            .lock()
            .expect("ephemeral cache mutex poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.store
            .lock()
            .expect("ephemeral cache mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Janitor hook: drop every entry older than the TTL, regardless of
    /// capacity. Returns the number removed.
    pub(crate) fn sweep_expired(&self) -> usize {
        let ttl = self.ttl;
        self.store
            .lock()
            .expect("ephemeral cache mutex poisoned")
            .retain(|e| e.inserted_at.elapsed() <= ttl)
    }
}
