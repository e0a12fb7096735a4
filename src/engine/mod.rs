//! Streaming completion engine.
//!
//! Opens a streaming request against a pooled client, accumulates both
//! content channels under hard character ceilings, tracks first-token
//! latency and backend throughput, and converts every fatal condition into
//! the result's `error` field. Nothing escapes [`CompletionEngine::complete`]
//! as a panic or a bare `Err`.

pub mod request;
pub mod sse;

pub use request::{ChatMessage, RequestBody};

use crate::config::{EngineSettings, ProviderConfig, RequestMode};
use crate::decode::{self, StructuredReply};
use crate::pool::ProviderPool;
use crate::tokens::{estimate_by_chars, CharacterEstimator, TokenEstimator};
use crate::{BoxStream, Error, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Marker appended to a channel cut off at its ceiling.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Max chars of an error response body carried into diagnostics.
const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// Final outcome of one completion call. Immutable once produced.
///
/// Exactly two shapes reach callers: a populated result with `error: None`,
/// or `{error, request_id}` with everything else empty. There is no
/// half-populated third state.
#[derive(Debug)]
pub struct CompletionResult {
    pub final_text: String,
    pub reasoning_text: String,
    pub time_to_first_token: Option<Duration>,
    pub tokens_per_second: Option<f64>,
    pub request_id: String,
    pub truncated: bool,
    pub error: Option<Error>,
}

impl CompletionResult {
    fn failed(request_id: String, error: Error) -> Self {
        Self {
            final_text: String::new(),
            reasoning_text: String::new(),
            time_to_first_token: None,
            tokens_per_second: None,
            request_id,
            truncated: false,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-request accumulation state. Exclusively owned by one in-flight call;
/// buffers are moved into the result at finalization, never cloned.
struct StreamState {
    content: String,
    reasoning: String,
    content_chars: usize,
    reasoning_chars: usize,
    content_truncated: bool,
    reasoning_truncated: bool,
    first_token: Option<Duration>,
    backend_start: Option<Instant>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            content: String::new(),
            reasoning: String::new(),
            content_chars: 0,
            reasoning_chars: 0,
            content_truncated: false,
            reasoning_truncated: false,
            first_token: None,
            backend_start: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty()
    }

    fn mark_first_token(&mut self, since_start: Duration) {
        if self.first_token.is_none() {
            self.first_token = Some(since_start);
            self.backend_start = Some(Instant::now());
        }
    }
}

/// Append `fragment` to `buf` without exceeding `ceiling` chars. Returns
/// true when the ceiling was hit (marker appended, channel closed).
fn append_bounded(buf: &mut String, chars: &mut usize, fragment: &str, ceiling: usize) -> bool {
    let fragment_chars = fragment.chars().count();
    if *chars + fragment_chars <= ceiling {
        buf.push_str(fragment);
        *chars += fragment_chars;
        return false;
    }
    let remaining = ceiling.saturating_sub(*chars);
    buf.extend(fragment.chars().take(remaining));
    *chars = ceiling;
    buf.push_str(TRUNCATION_MARKER);
    true
}

pub struct CompletionEngine {
    pool: Arc<ProviderPool>,
    settings: EngineSettings,
    estimator: Arc<dyn TokenEstimator>,
}

impl CompletionEngine {
    pub fn new(pool: Arc<ProviderPool>, settings: EngineSettings) -> Self {
        Self {
            pool,
            settings,
            estimator: Arc::new(CharacterEstimator),
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one streaming completion in chat mode.
    pub async fn complete(
        &self,
        body: &RequestBody,
        provider: &ProviderConfig,
    ) -> CompletionResult {
        self.complete_with_mode(body, provider, RequestMode::Chat)
            .await
    }

    /// Run one streaming completion with the given mode's ceilings.
    pub async fn complete_with_mode(
        &self,
        body: &RequestBody,
        provider: &ProviderConfig,
        mode: RequestMode,
    ) -> CompletionResult {
        let request_id = new_request_id();
        match self.run(&request_id, body, provider, mode).await {
            Ok(result) => result,
            Err(e) => {
                error!(request_id = request_id.as_str(), error = %e, "completion failed");
                CompletionResult::failed(request_id, e)
            }
        }
    }

    /// Tool/chain-of-thought variant: run with the tool ceiling and recover
    /// a [`StructuredReply`] from the final text. Decode failure collapses to
    /// the `{error, request_id}` result shape (the decode error already
    /// carries a bounded text preview); the reply is then `None`.
    pub async fn complete_structured(
        &self,
        body: &RequestBody,
        provider: &ProviderConfig,
    ) -> (CompletionResult, Option<StructuredReply>) {
        let result = self
            .complete_with_mode(body, provider, RequestMode::Tool)
            .await;
        if result.error.is_some() {
            return (result, None);
        }
        match decode::recover_structured(&result.final_text) {
            Ok(reply) => (result, Some(reply)),
            Err(e) => {
                error!(
                    request_id = result.request_id.as_str(),
                    error = %e,
                    "structured decode failed"
                );
                (CompletionResult::failed(result.request_id, e), None)
            }
        }
    }

    async fn run(
        &self,
        request_id: &str,
        body: &RequestBody,
        provider: &ProviderConfig,
        mode: RequestMode,
    ) -> Result<CompletionResult> {
        provider.validate()?;
        body.validate()?;

        let client = self.pool.get(&provider.endpoint, &provider.api_key);
        let wire = body.to_wire(provider);
        let content_ceiling = self.settings.content_ceiling_for(mode);
        let reasoning_ceiling = self.settings.reasoning_ceiling;

        info!(
            request_id,
            endpoint = provider.endpoint.as_str(),
            model = provider.model.as_str(),
            model_type = provider.model_type.as_str(),
            "opening completion stream"
        );
        let start = Instant::now();

        let resp = client.open_stream(&wire, request_id).await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body: crate::error::bounded_preview(&text, ERROR_BODY_PREVIEW_CHARS),
            });
        }

        let byte_stream: BoxStream<'static, bytes::Bytes> = Box::pin(
            resp.bytes_stream()
                .map(|r| r.map_err(|e| Error::transport(format!("stream read failed: {e}")))),
        );
        let mut chunks = sse::decode_sse(byte_stream);
        let mut state = StreamState::new();

        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    let (content, reasoning) = sse::delta_channels(&chunk);

                    if let Some(fragment) = reasoning {
                        if !fragment.is_empty() {
                            if state.first_token.is_none() {
                                state.mark_first_token(start.elapsed());
                                info!(
                                    request_id,
                                    ttft_ms = start.elapsed().as_millis() as u64,
                                    "first token received"
                                );
                            }
                            if !state.reasoning_truncated
                                && append_bounded(
                                    &mut state.reasoning,
                                    &mut state.reasoning_chars,
                                    fragment,
                                    reasoning_ceiling,
                                )
                            {
                                // Reasoning channel closed; content keeps going.
                                state.reasoning_truncated = true;
                                warn!(request_id, "reasoning ceiling reached");
                            }
                        }
                    }

                    if let Some(fragment) = content {
                        if !fragment.is_empty() {
                            if state.first_token.is_none() {
                                state.mark_first_token(start.elapsed());
                                info!(
                                    request_id,
                                    ttft_ms = start.elapsed().as_millis() as u64,
                                    "first token received"
                                );
                            }
                            if append_bounded(
                                &mut state.content,
                                &mut state.content_chars,
                                fragment,
                                content_ceiling,
                            ) {
                                state.content_truncated = true;
                                warn!(
                                    request_id,
                                    ceiling = content_ceiling,
                                    "content ceiling reached, aborting stream"
                                );
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    if state.is_empty() {
                        return Err(e);
                    }
                    // Graceful degradation: partial content beats failure.
                    warn!(
                        request_id,
                        error = %e,
                        "stream read failed, finalizing with partial content"
                    );
                    break;
                }
            }
        }
        // Dropping the chunk stream here tears down the response body and
        // with it the in-flight connection, which is the abort path for
        // ceiling breaches.
        drop(chunks);

        if state.is_empty() {
            return Err(Error::EmptyResponse);
        }

        let backend_elapsed = state.backend_start.map(|t| t.elapsed());
        let truncated = state.content_truncated || state.reasoning_truncated;

        // Move buffers out of the stream state; no copies of the large
        // accumulations survive past this point.
        let content = std::mem::take(&mut state.content);
        let reasoning = std::mem::take(&mut state.reasoning);

        // Providers without a reasoning channel inline their thinking into
        // the content behind delimiter tags.
        let (final_text, reasoning_text) = if reasoning.is_empty() {
            let seg = decode::split_reasoning(&content);
            (seg.final_text, seg.reasoning)
        } else {
            (content, reasoning)
        };

        let tokens = self.estimate_tokens(&final_text, &reasoning_text).await;
        let tokens_per_second = backend_elapsed.and_then(|elapsed| {
            let secs = elapsed.as_secs_f64();
            (secs > 0.0).then(|| tokens as f64 / secs)
        });

        info!(
            request_id,
            duration_ms = start.elapsed().as_millis() as u64,
            tokens,
            truncated,
            "completion finished"
        );

        Ok(CompletionResult {
            final_text,
            reasoning_text,
            time_to_first_token: state.first_token,
            tokens_per_second,
            request_id: request_id.to_string(),
            truncated,
            error: None,
        })
    }

    /// Remote/tokenizer count first, character-ratio fallback on failure.
    async fn estimate_tokens(&self, final_text: &str, reasoning_text: &str) -> usize {
        let combined_len = final_text.len() + reasoning_text.len();
        let mut text = String::with_capacity(combined_len);
        text.push_str(reasoning_text);
        text.push_str(final_text);
        match self.estimator.count(&text).await {
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "token estimator failed, using character fallback");
                estimate_by_chars(&text)
            }
        }
    }
}

/// Unix-millis timestamp plus a short random suffix. Unique per in-flight
/// request; used to correlate every log line of one call.
fn new_request_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_distinct() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn append_bounded_respects_ceiling() {
        let mut buf = String::new();
        let mut chars = 0;
        let hit = append_bounded(&mut buf, &mut chars, &"x".repeat(150), 100);
        assert!(hit);
        assert_eq!(chars, 100);
        assert_eq!(buf.len(), 100 + TRUNCATION_MARKER.len());
        assert!(buf.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn append_bounded_accumulates_across_fragments() {
        let mut buf = String::new();
        let mut chars = 0;
        assert!(!append_bounded(&mut buf, &mut chars, "abcdef", 10));
        assert!(append_bounded(&mut buf, &mut chars, "ghijkl", 10));
        assert!(buf.starts_with("abcdefghij"));
        assert_eq!(chars, 10);
    }

    #[test]
    fn append_bounded_is_char_safe() {
        let mut buf = String::new();
        let mut chars = 0;
        append_bounded(&mut buf, &mut chars, "ééééé", 3);
        assert!(buf.starts_with("ééé"));
        assert_eq!(chars, 3);
    }

    #[tokio::test]
    async fn invalid_provider_yields_configuration_error() {
        let pool = Arc::new(ProviderPool::new(5, Duration::from_secs(1)));
        let engine = CompletionEngine::new(pool, EngineSettings::default());
        let provider = ProviderConfig {
            endpoint: String::new(),
            api_key: "k".into(),
            model: "m".into(),
            model_type: String::new(),
            max_tokens: 0,
        };
        let body = RequestBody::new(vec![ChatMessage::user("hi")]);
        let result = engine.complete(&body, &provider).await;
        assert!(matches!(result.error, Some(Error::Configuration(_))));
        assert!(result.final_text.is_empty());
        assert!(!result.request_id.is_empty());
    }

    #[tokio::test]
    async fn empty_body_yields_request_error() {
        let pool = Arc::new(ProviderPool::new(5, Duration::from_secs(1)));
        let engine = CompletionEngine::new(pool, EngineSettings::default());
        let provider = ProviderConfig {
            endpoint: "http://localhost:9/v1/chat/completions".into(),
            api_key: "k".into(),
            model: "m".into(),
            model_type: String::new(),
            max_tokens: 0,
        };
        let result = engine.complete(&RequestBody::new(vec![]), &provider).await;
        assert!(matches!(result.error, Some(Error::Request(_))));
    }
}
