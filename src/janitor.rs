//! Periodic cache sweeper.
//!
//! Runs independently of any request: re-enforces the template cache's
//! capacity and drops expired ephemeral entries. The provider pool is never
//! touched here; pool eviction happens on the insertion path only.

use crate::cache::{EphemeralCache, TemplateCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct Janitor {
    handle: JoinHandle<()>,
}

impl Janitor {
    /// Spawn the recurring sweep task. The first tick fires after one full
    /// interval, not immediately.
    pub fn spawn(
        templates: Arc<TemplateCache>,
        ephemeral: Arc<EphemeralCache>,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // completes immediately
            loop {
                ticker.tick().await;
                let swept = sweep(&templates, &ephemeral);
                if swept > 0 {
                    debug!(swept, "janitor removed cache entries");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) fn sweep(templates: &TemplateCache, ephemeral: &EphemeralCache) -> usize {
    templates.sweep_to_capacity() + ephemeral.sweep_expired()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sweep_removes_expired_ephemeral_entries() {
        let templates = TemplateCache::new(10);
        let ephemeral = EphemeralCache::new(10, Duration::from_millis(10));
        ephemeral.put("stale", json!(1));
        templates.put("kept", "text");
        std::thread::sleep(Duration::from_millis(20));
        let swept = sweep(&templates, &ephemeral);
        assert_eq!(swept, 1);
        assert!(ephemeral.is_empty());
        assert_eq!(templates.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_on_interval() {
        let templates = Arc::new(TemplateCache::new(10));
        let ephemeral = Arc::new(EphemeralCache::new(10, Duration::from_secs(0)));
        ephemeral.put("doomed", json!(1));
        let janitor = Janitor::spawn(templates, ephemeral.clone(), Duration::from_secs(300));

        // The task must be polled once so its interval exists before the
        // clock moves.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(301)).await;
        // Let the spawned task observe the tick.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(ephemeral.is_empty());
        janitor.stop();
    }
}
