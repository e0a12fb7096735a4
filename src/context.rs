//! Explicit dependency container for the client subsystem.
//!
//! One [`EngineContext`] is constructed at startup and passed to callers,
//! replacing process-wide singletons: teardown is deterministic and tests
//! get isolated instances.

use crate::cache::{EphemeralCache, TemplateCache};
use crate::config::{ConfigSource, EngineSettings};
use crate::engine::CompletionEngine;
use crate::janitor::Janitor;
use crate::pool::ProviderPool;
use crate::tokens::TokenEstimator;
use std::sync::Arc;
use tracing::info;

pub struct EngineContext {
    pub pool: Arc<ProviderPool>,
    pub templates: Arc<TemplateCache>,
    pub ephemeral: Arc<EphemeralCache>,
    pub engine: CompletionEngine,
    janitor: Option<Janitor>,
}

impl EngineContext {
    pub fn builder() -> EngineContextBuilder {
        EngineContextBuilder::default()
    }

    /// Manual variant of the janitor sweep that also disposes every pooled
    /// client. Intended for operator-triggered resets and shutdown.
    pub fn clear_all_caches(&self) {
        self.templates.clear();
        self.ephemeral.clear();
        self.pool.shutdown();
        info!("all caches cleared and pool disposed");
    }

    /// Stop the background janitor, if one was started.
    pub fn shutdown(&self) {
        if let Some(j) = &self.janitor {
            j.stop();
        }
        self.pool.shutdown();
    }
}

#[derive(Default)]
pub struct EngineContextBuilder {
    settings: Option<EngineSettings>,
    estimator: Option<Arc<dyn TokenEstimator>>,
    start_janitor: bool,
}

impl EngineContextBuilder {
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Pull settings from the application's dot-path config store.
    pub fn settings_from(mut self, source: &dyn ConfigSource) -> Self {
        self.settings = Some(EngineSettings::from_source(source));
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Start the periodic janitor task. Requires a running tokio runtime at
    /// `build` time.
    pub fn with_janitor(mut self) -> Self {
        self.start_janitor = true;
        self
    }

    pub fn build(self) -> EngineContext {
        let settings = self.settings.unwrap_or_default();
        let pool = Arc::new(ProviderPool::new(
            settings.pool_capacity,
            settings.connect_timeout,
        ));
        let templates = Arc::new(TemplateCache::new(settings.template_cache_capacity));
        let ephemeral = Arc::new(EphemeralCache::new(
            settings.ephemeral_cache_capacity,
            settings.ephemeral_ttl,
        ));

        let janitor = self.start_janitor.then(|| {
            Janitor::spawn(
                templates.clone(),
                ephemeral.clone(),
                settings.janitor_interval,
            )
        });

        let mut engine = CompletionEngine::new(pool.clone(), settings);
        if let Some(est) = self.estimator {
            engine = engine.with_estimator(est);
        }

        EngineContext {
            pool,
            templates,
            ephemeral,
            engine,
            janitor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_without_janitor_needs_no_runtime() {
        let ctx = EngineContext::builder().build();
        assert!(ctx.pool.is_empty());
        assert_eq!(ctx.engine.settings().pool_capacity, 5);
    }

    #[tokio::test]
    async fn clear_all_caches_empties_everything() {
        let ctx = EngineContext::builder().with_janitor().build();
        ctx.templates.put("t", "text");
        ctx.ephemeral.put("e", json!(1));
        ctx.pool.get("http://x", "sk-xxxxxxxx");

        ctx.clear_all_caches();
        assert!(ctx.templates.is_empty());
        assert!(ctx.ephemeral.is_empty());
        assert!(ctx.pool.is_empty());
        ctx.shutdown();
    }
}
