//! Output token estimation.
//!
//! The engine prefers a provider-side tokenizer when one is configured and
//! falls back to a character-ratio estimate when the remote call fails.

use crate::{Error, Result};
use async_trait::async_trait;

/// Chars-per-token ratio for the fallback estimate.
const CHARS_PER_TOKEN: f64 = 4.0;

#[async_trait]
pub trait TokenEstimator: Send + Sync {
    async fn count(&self, text: &str) -> Result<usize>;
}

/// `ceil(chars / 4)`. Never fails; also used as the universal fallback.
#[derive(Debug, Clone, Default)]
pub struct CharacterEstimator;

#[async_trait]
impl TokenEstimator for CharacterEstimator {
    async fn count(&self, text: &str) -> Result<usize> {
        Ok(estimate_by_chars(text))
    }
}

pub fn estimate_by_chars(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as usize
}

/// Tokenizer endpoint speaking `{"content": ...} -> {"count": n}` (llama.cpp
/// style `/tokenize` replies also match via the `tokens` array).
pub struct RemoteEstimator {
    http: reqwest::Client,
    url: String,
}

impl RemoteEstimator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenEstimator for RemoteEstimator {
    async fn count(&self, text: &str) -> Result<usize> {
        let resp = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .map_err(|e| Error::transport(format!("tokenizer call failed: {e}")))?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::transport(format!("tokenizer reply unreadable: {e}")))?;
        body.get("count")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .or_else(|| body.get("tokens").and_then(|v| v.as_array()).map(|a| a.len()))
            .ok_or_else(|| Error::transport("tokenizer reply carried no count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_estimate_rounds_up() {
        assert_eq!(estimate_by_chars(""), 0);
        assert_eq!(estimate_by_chars("abc"), 1);
        assert_eq!(estimate_by_chars("abcd"), 1);
        assert_eq!(estimate_by_chars("abcde"), 2);
    }

    #[tokio::test]
    async fn character_estimator_never_fails() {
        let est = CharacterEstimator;
        assert_eq!(est.count("12345678").await.unwrap(), 2);
    }
}
