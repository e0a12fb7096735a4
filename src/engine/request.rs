//! Inbound request body contract.
//!
//! Assembled by the prompt collaborator; the engine validates only that
//! message content exists and leaves sampling-parameter semantics alone.

use crate::config::ProviderConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Chat-completion request body: messages plus pass-through sampling
/// parameters (temperature, top_p, ...) the engine does not interpret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    /// Overrides `ProviderConfig::model` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl RequestBody {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::request("request body has no messages"));
        }
        if self.messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(Error::request("request body has no message content"));
        }
        Ok(())
    }

    /// Compile into the provider wire shape: model resolution, `stream: true`
    /// and the provider's max_tokens cap when the body carries none.
    pub fn to_wire(&self, provider: &ProviderConfig) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert(
            "model".to_string(),
            serde_json::Value::String(
                self.model.clone().unwrap_or_else(|| provider.model.clone()),
            ),
        );
        out.insert(
            "messages".to_string(),
            serde_json::to_value(&self.messages).unwrap_or_default(),
        );
        out.insert("stream".to_string(), serde_json::Value::Bool(true));
        for (k, v) in &self.params {
            out.insert(k.clone(), v.clone());
        }
        if provider.max_tokens > 0 && !out.contains_key("max_tokens") {
            out.insert("max_tokens".to_string(), provider.max_tokens.into());
        }
        serde_json::Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig {
            endpoint: "http://localhost/v1/chat/completions".into(),
            api_key: "sk-test".into(),
            model: "default-model".into(),
            model_type: "openai".into(),
            max_tokens: 256,
        }
    }

    #[test]
    fn empty_messages_fail_validation() {
        assert!(RequestBody::new(vec![]).validate().is_err());
        let blank = RequestBody::new(vec![ChatMessage::user("   ")]);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn wire_shape_forces_stream_and_resolves_model() {
        let body = RequestBody::new(vec![ChatMessage::user("hi")])
            .with_param("temperature", serde_json::json!(0.7));
        let wire = body.to_wire(&provider());
        assert_eq!(wire["model"], "default-model");
        assert_eq!(wire["stream"], true);
        assert_eq!(wire["temperature"], 0.7);
        assert_eq!(wire["max_tokens"], 256);
        assert_eq!(wire["messages"][0]["content"], "hi");
    }

    #[test]
    fn body_model_and_explicit_max_tokens_win() {
        let mut body = RequestBody::new(vec![ChatMessage::user("hi")])
            .with_param("max_tokens", serde_json::json!(64));
        body.model = Some("override".into());
        let wire = body.to_wire(&provider());
        assert_eq!(wire["model"], "override");
        assert_eq!(wire["max_tokens"], 64);
    }
}
