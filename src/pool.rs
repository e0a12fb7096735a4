//! Bounded pool of provider HTTP clients.
//!
//! One reusable client per `(endpoint, api-key prefix)` pair. The pool never
//! performs network I/O in `get`; `reqwest` clients connect lazily on first
//! use, so construction of a client for a malformed endpoint succeeds and the
//! failure surfaces on the first stream open.

use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chars of the api key used in the pool key. Enough to distinguish
/// credentials without ever storing the full secret in a map key.
const KEY_PREFIX_CHARS: usize = 8;

/// A reusable handle to one provider endpoint.
///
/// Owns the underlying `reqwest::Client` (and thereby its connection pool).
/// Handed out as `Arc` so in-flight requests keep an evicted client alive
/// until their stream finishes; the pool itself drops its reference on
/// eviction.
pub struct PooledClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    closed: AtomicBool,
}

impl PooledClient {
    fn new(endpoint: &str, api_key: &str, connect_timeout: Duration) -> Self {
        // Connection reuse and keepalive live here, not in the engine.
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Open a streaming completion request. Connection failures are
    /// classified into [`crate::ConnectionKind`] categories.
    pub async fn open_stream(
        &self,
        body: &serde_json::Value,
        request_id: &str,
    ) -> Result<reqwest::Response> {
        self.http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("accept", "text/event-stream")
            .header("x-client-request-id", request_id)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::from_connect(e, &self.endpoint))
    }

    /// Mark the client disposed. Transport teardown happens when the last
    /// `Arc` drops; eviction and shutdown both call this first.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct PoolEntry {
    client: Arc<PooledClient>,
    last_used: Instant,
}

/// Bounded, oldest-evicting pool keyed by endpoint plus api-key prefix.
///
/// The only shared mutable cross-request resource in the crate; the map is
/// guarded by a mutex with no I/O under the lock.
pub struct ProviderPool {
    entries: Mutex<HashMap<String, PoolEntry>>,
    capacity: usize,
    connect_timeout: Duration,
}

impl ProviderPool {
    pub fn new(capacity: usize, connect_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            connect_timeout,
        }
    }

    fn pool_key(endpoint: &str, api_key: &str) -> String {
        let prefix: String = api_key.chars().take(KEY_PREFIX_CHARS).collect();
        format!("{endpoint}#{prefix}")
    }

    /// Return the live client for this endpoint/key, creating it on first
    /// use. Exceeding capacity evicts (and closes) the single entry with the
    /// oldest `last_used`.
    pub fn get(&self, endpoint: &str, api_key: &str) -> Arc<PooledClient> {
        let key = Self::pool_key(endpoint, api_key);
        let mut entries = self.entries.lock().expect("pool mutex poisoned");

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_used = Instant::now();
            return entry.client.clone();
        }

        let client = Arc::new(PooledClient::new(endpoint, api_key, self.connect_timeout));
        entries.insert(
            key,
            PoolEntry {
                client: client.clone(),
                last_used: Instant::now(),
            },
        );

        if entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                if let Some(evicted) = entries.remove(&k) {
                    evicted.client.close();
                    debug!(endpoint = evicted.client.endpoint(), "evicted pooled client");
                }
            }
        }

        client
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("pool mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close and drop every pooled client.
    pub fn shutdown(&self) {
        let mut entries = self.entries.lock().expect("pool mutex poisoned");
        for (_, entry) in entries.drain() {
            entry.client.close();
        }
        info!("provider pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> ProviderPool {
        ProviderPool::new(capacity, Duration::from_secs(5))
    }

    #[test]
    fn same_key_reuses_client() {
        let p = pool(5);
        let a = p.get("http://one", "sk-abcdefgh123");
        let b = p.get("http://one", "sk-abcdefgh123");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn key_prefix_distinguishes_credentials() {
        let p = pool(5);
        let a = p.get("http://one", "sk-aaaaaaaa-first");
        let b = p.get("http://one", "sk-bbbbbbbb-second");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn capacity_plus_one_evicts_oldest() {
        let p = pool(3);
        let first = p.get("http://e0", "sk-00000000");
        for i in 1..=3 {
            p.get(&format!("http://e{i}"), &format!("sk-{i}{i}{i}{i}{i}{i}{i}{i}"));
            // Distinct last_used ordering on coarse clocks.
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(p.len(), 3);
        assert!(first.is_closed());
        // First key is gone: fetching it again yields a fresh client.
        let again = p.get("http://e0", "sk-00000000");
        assert!(!Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn recently_used_entry_survives_eviction() {
        let p = pool(2);
        let a = p.get("http://a", "sk-aaaaaaaa");
        std::thread::sleep(Duration::from_millis(2));
        p.get("http://b", "sk-bbbbbbbb");
        std::thread::sleep(Duration::from_millis(2));
        // Touch "a" so "b" becomes the oldest.
        p.get("http://a", "sk-aaaaaaaa");
        std::thread::sleep(Duration::from_millis(2));
        p.get("http://c", "sk-cccccccc");
        assert_eq!(p.len(), 2);
        assert!(!a.is_closed());
    }

    #[test]
    fn shutdown_closes_everything() {
        let p = pool(5);
        let a = p.get("http://a", "sk-aaaaaaaa");
        let b = p.get("http://b", "sk-bbbbbbbb");
        p.shutdown();
        assert!(p.is_empty());
        assert!(a.is_closed());
        assert!(b.is_closed());
    }
}
