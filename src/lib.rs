//! # llm-stream-client
//!
//! Streaming completion client for OpenAI-compatible providers, built around
//! bounded resources and resilient error handling.
//!
//! ## Overview
//!
//! This crate issues streaming chat-completion requests, consumes the
//! incremental SSE token stream, and recovers a structured result from
//! whatever the provider produced - including reasoning text folded into the
//! content channel and malformed JSON from tool-style prompts. Memory and
//! connection use are bounded throughout: one pooled client per
//! endpoint/credential pair, hard character ceilings per stream channel, and
//! capacity-bound caches swept by a background janitor.
//!
//! ## Key Features
//!
//! - **Streaming Engine**: [`CompletionEngine`] opens pooled streaming
//!   requests, tracks time-to-first-token and backend throughput, and turns
//!   every fatal condition into [`CompletionResult::error`] - nothing
//!   escapes the boundary as a panic.
//! - **Bounded Pooling**: [`pool::ProviderPool`] keeps at most N live
//!   clients, evicting (and closing) the least-recently-used.
//! - **Caching**: insertion-order bounded [`cache::TemplateCache`] and
//!   TTL-bound [`cache::EphemeralCache`].
//! - **Output Recovery**: [`decode::split_reasoning`] separates `<think>`
//!   blocks from answers; [`decode::recover_structured`] repairs malformed
//!   JSON with graduated fallbacks.
//! - **Janitor**: periodic sweep of expired/over-quota cache entries.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_stream_client::{ChatMessage, EngineContext, ProviderConfig, RequestBody};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = EngineContext::builder().with_janitor().build();
//!
//!     let provider = ProviderConfig {
//!         endpoint: "https://api.example.com/v1/chat/completions".into(),
//!         api_key: "sk-...".into(),
//!         model: "gpt-4o-mini".into(),
//!         model_type: "openai".into(),
//!         max_tokens: 1024,
//!     };
//!     let body = RequestBody::new(vec![ChatMessage::user("Hello!")]);
//!
//!     let result = ctx.engine.complete(&body, &provider).await;
//!     match &result.error {
//!         None => println!("{}", result.final_text),
//!         Some(e) => eprintln!("[{}] {}", result.request_id, e),
//!     }
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`engine`] | Streaming completion engine and request types |
//! | [`pool`] | Bounded provider client pool |
//! | [`cache`] | Template and ephemeral caches |
//! | [`decode`] | Reasoning segmentation and structured JSON recovery |
//! | [`tokens`] | Token estimation |
//! | [`janitor`] | Periodic cache sweeper |
//! | [`context`] | Dependency container wiring the above together |
//! | [`config`] | Provider configuration and tuning knobs |

pub mod cache;
pub mod config;
pub mod context;
pub mod decode;
pub mod engine;
pub mod janitor;
pub mod pool;
pub mod tokens;

pub mod error;

// Re-export main types for convenience
pub use config::{ConfigSource, EngineSettings, ProviderConfig, RequestMode};
pub use context::EngineContext;
pub use decode::{recover_structured, split_reasoning, Segmented, StructuredReply};
pub use engine::{ChatMessage, CompletionEngine, CompletionResult, RequestBody};
pub use error::{ConnectionKind, Error};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of fallible items.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;
