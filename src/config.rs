//! Provider configuration and engine tuning knobs.
//!
//! All limits have sensible defaults; a [`ConfigSource`] collaborator (the
//! application's dot-path configuration store) can override any of them
//! without this crate knowing where the values live.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request provider description, supplied by the caller.
///
/// Immutable for the lifetime of one request. The engine validates presence
/// of `endpoint`, `api_key` and `model` before touching the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Full URL of the streaming completion endpoint.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Free-form provider family hint ("openai", "local", ...). Not
    /// interpreted by the engine, but logged for diagnostics.
    #[serde(default)]
    pub model_type: String,
    /// Output token cap forwarded to the provider. Zero means "omit".
    #[serde(default)]
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::configuration("provider endpoint is not set"));
        }
        if url::Url::parse(self.endpoint.trim()).is_err() {
            return Err(Error::configuration(format!(
                "provider endpoint is not a valid URL: {}",
                self.endpoint
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::configuration("provider api key is not set"));
        }
        if self.model.trim().is_empty() {
            return Err(Error::configuration("provider model is not set"));
        }
        Ok(())
    }
}

/// Which per-mode output ceiling applies to a request.
///
/// Tool and summarization calls produce bounded artifacts and get lower
/// ceilings than free-form chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Chat,
    Tool,
    Summary,
}

/// Dot-path configuration lookup, provided by the surrounding application.
///
/// Absent keys fall back to the defaults baked into [`EngineSettings`].
pub trait ConfigSource: Send + Sync {
    fn get(&self, path: &str) -> Option<serde_json::Value>;
}

/// Tuning knobs for the pool, caches, ceilings and janitor.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum live pooled clients (distinct endpoint/key pairs).
    pub pool_capacity: usize,
    pub template_cache_capacity: usize,
    pub ephemeral_cache_capacity: usize,
    pub ephemeral_ttl: Duration,
    /// Hard character ceiling for the ordinary content channel, chat mode.
    pub content_ceiling: usize,
    pub tool_ceiling: usize,
    pub summary_ceiling: usize,
    /// Hard character ceiling for the reasoning channel, all modes.
    pub reasoning_ceiling: usize,
    pub janitor_interval: Duration,
    /// Transport-level connect timeout baked into pooled clients. The engine
    /// itself imposes no per-stream deadline.
    pub connect_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pool_capacity: 5,
            template_cache_capacity: 50,
            ephemeral_cache_capacity: 25,
            ephemeral_ttl: Duration::from_secs(300),
            content_ceiling: 75_000,
            tool_ceiling: 25_000,
            summary_ceiling: 50_000,
            reasoning_ceiling: 75_000,
            janitor_interval: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineSettings {
    /// Build settings from the application's dot-path config store, keeping
    /// the default for any absent or malformed key.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut s = Self::default();
        if let Some(v) = read_usize(source, "llm.pool.capacity") {
            s.pool_capacity = v.max(1);
        }
        if let Some(v) = read_usize(source, "llm.cache.template.capacity") {
            s.template_cache_capacity = v.max(1);
        }
        if let Some(v) = read_usize(source, "llm.cache.ephemeral.capacity") {
            s.ephemeral_cache_capacity = v.max(1);
        }
        if let Some(v) = read_u64(source, "llm.cache.ephemeral.ttl_secs") {
            s.ephemeral_ttl = Duration::from_secs(v);
        }
        if let Some(v) = read_usize(source, "llm.limits.content_chars") {
            s.content_ceiling = v;
        }
        if let Some(v) = read_usize(source, "llm.limits.tool_chars") {
            s.tool_ceiling = v;
        }
        if let Some(v) = read_usize(source, "llm.limits.summary_chars") {
            s.summary_ceiling = v;
        }
        if let Some(v) = read_usize(source, "llm.limits.reasoning_chars") {
            s.reasoning_ceiling = v;
        }
        if let Some(v) = read_u64(source, "llm.janitor.interval_secs") {
            s.janitor_interval = Duration::from_secs(v.max(1));
        }
        if let Some(v) = read_u64(source, "llm.http.connect_timeout_secs") {
            s.connect_timeout = Duration::from_secs(v.max(1));
        }
        s
    }

    /// Content-channel ceiling for the given request mode.
    pub fn content_ceiling_for(&self, mode: RequestMode) -> usize {
        match mode {
            RequestMode::Chat => self.content_ceiling,
            RequestMode::Tool => self.tool_ceiling,
            RequestMode::Summary => self.summary_ceiling,
        }
    }
}

fn read_u64(source: &dyn ConfigSource, path: &str) -> Option<u64> {
    source.get(path).and_then(|v| v.as_u64())
}

fn read_usize(source: &dyn ConfigSource, path: &str) -> Option<usize> {
    read_u64(source, path).map(|v| v as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct MapSource(HashMap<String, serde_json::Value>);

    impl ConfigSource for MapSource {
        fn get(&self, path: &str) -> Option<serde_json::Value> {
            self.0.get(path).cloned()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = EngineSettings::default();
        assert_eq!(s.pool_capacity, 5);
        assert_eq!(s.template_cache_capacity, 50);
        assert_eq!(s.ephemeral_cache_capacity, 25);
        assert_eq!(s.ephemeral_ttl, Duration::from_secs(300));
        assert_eq!(s.content_ceiling, 75_000);
    }

    #[test]
    fn source_overrides_defaults_and_ignores_garbage() {
        let mut map = HashMap::new();
        map.insert("llm.pool.capacity".to_string(), json!(3));
        map.insert("llm.limits.tool_chars".to_string(), json!(30_000));
        map.insert("llm.cache.ephemeral.ttl_secs".to_string(), json!("nope"));
        let s = EngineSettings::from_source(&MapSource(map));
        assert_eq!(s.pool_capacity, 3);
        assert_eq!(s.tool_ceiling, 30_000);
        assert_eq!(s.ephemeral_ttl, Duration::from_secs(300));
    }

    #[test]
    fn mode_selects_ceiling() {
        let s = EngineSettings::default();
        assert_eq!(s.content_ceiling_for(RequestMode::Chat), 75_000);
        assert_eq!(s.content_ceiling_for(RequestMode::Tool), 25_000);
        assert_eq!(s.content_ceiling_for(RequestMode::Summary), 50_000);
    }

    #[test]
    fn provider_config_requires_core_fields() {
        let mut cfg = ProviderConfig {
            endpoint: "http://localhost:8080/v1/chat/completions".into(),
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
            model_type: String::new(),
            max_tokens: 0,
        };
        assert!(cfg.validate().is_ok());
        cfg.api_key = "  ".into();
        assert!(cfg.validate().is_err());
    }
}
