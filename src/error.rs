use thiserror::Error;

/// How a connection-establishment failure should be reported to the caller.
///
/// The raw `reqwest` error chain is unhelpful to operators ("error sending
/// request for url ..."); we classify into actionable categories and attach
/// the provider endpoint instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// TCP connection actively refused (provider down or wrong port).
    Refused,
    /// Hostname could not be resolved.
    Unresolved,
    /// Connect or read timed out at the transport layer.
    TimedOut,
    /// Anything else (TLS failures, resets, ...).
    Other,
}

impl ConnectionKind {
    pub fn diagnostic(&self, endpoint: &str) -> String {
        match self {
            ConnectionKind::Refused => format!(
                "connection refused by provider at {endpoint} - is the completion service running?"
            ),
            ConnectionKind::Unresolved => {
                format!("could not resolve provider host for {endpoint} - check the endpoint URL")
            }
            ConnectionKind::TimedOut => {
                format!("timed out connecting to provider at {endpoint}")
            }
            ConnectionKind::Other => format!("failed to reach provider at {endpoint}"),
        }
    }
}

/// Unified error type for the completion client.
///
/// Every fatal path inside the engine is converted into one of these
/// categories at the boundary where it occurs; errors never cross the engine
/// boundary as panics. Callers receive them through
/// [`CompletionResult::error`](crate::engine::CompletionResult).
#[derive(Debug, Error)]
pub enum Error {
    /// Provider configuration is incomplete (missing endpoint/api key/model).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Request body is unusable (no message content).
    #[error("request error: {0}")]
    Request(String),

    /// Could not establish the streaming connection.
    #[error("{}", .kind.diagnostic(.endpoint))]
    Connection { kind: ConnectionKind, endpoint: String },

    /// Provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    /// Stream ended with zero accumulated content in both channels.
    #[error("provider produced an empty response")]
    EmptyResponse,

    /// Structured output unrecoverable after repair and emergency extraction.
    /// Carries a bounded-length prefix of the raw text, never the full text.
    #[error("structured decode failed: {message} (text starts with: {preview:?})")]
    Decode { message: String, preview: String },

    /// Mid-stream transport failure (only fatal when no partial content exists).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Error::Request(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Classify a `reqwest` error raised while opening a stream.
    ///
    /// Classification is by error kind first, then by substring over the
    /// source chain, mirroring what the transport actually reports for
    /// refused sockets and failed lookups.
    pub fn from_connect(err: reqwest::Error, endpoint: &str) -> Self {
        let kind = if err.is_timeout() {
            ConnectionKind::TimedOut
        } else if err.is_connect() {
            let chain = {
                use std::error::Error as _;
                let mut parts = vec![err.to_string()];
                let mut source = err.source();
                while let Some(s) = source {
                    parts.push(s.to_string());
                    source = s.source();
                }
                parts.join(": ").to_lowercase()
            };
            if chain.contains("refused") {
                ConnectionKind::Refused
            } else if chain.contains("dns") || chain.contains("failed to lookup") {
                ConnectionKind::Unresolved
            } else {
                ConnectionKind::Other
            }
        } else {
            ConnectionKind::Other
        };
        Error::Connection {
            kind,
            endpoint: endpoint.to_string(),
        }
    }
}

/// Bound a diagnostic excerpt to `max_chars`, respecting char boundaries.
pub(crate) fn bounded_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
