//! Structured (JSON) output recovery with graduated fallbacks.
//!
//! Models asked for JSON routinely emit markdown fences, trailing commas or
//! outputs cut off mid-string. Recovery runs strict parse, then a lenient
//! repair pass, then an emergency regex extraction of the one field the
//! application cannot live without.

use crate::error::bounded_preview;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Max chars of raw text carried in a decode error for diagnostics.
const DECODE_PREVIEW_CHARS: usize = 200;

/// Reply used when even the emergency extraction finds an empty value.
const FALLBACK_RESPONSE: &str = "Sorry, I had trouble putting together a proper reply.";

static FINAL_RESPONSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""final_response"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("static regex")
});

/// The structured shape tool/chain-of-thought prompts ask the model for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredReply {
    pub final_response: String,
    #[serde(default)]
    pub thoughts: Vec<String>,
}

/// Recover a [`StructuredReply`] from raw streamed text.
///
/// Attempt order:
/// 1. strict `serde_json` parse (after stripping markdown fences);
/// 2. lenient repair via `jsonrepair` (trailing commas, unquoted keys,
///    truncated strings), then parse the repaired text;
/// 3. regex extraction of the `"final_response"` string value, synthesizing
///    a minimal reply with one diagnostic thought;
/// 4. [`Error::Decode`] carrying a bounded prefix of the input.
pub fn recover_structured(text: &str) -> Result<StructuredReply> {
    let candidate = strip_fences(text);

    if let Ok(reply) = serde_json::from_str::<StructuredReply>(candidate) {
        return Ok(reply);
    }

    match jsonrepair::repair_json(candidate, &jsonrepair::Options::default()) {
        Ok(repaired) => {
            if let Ok(reply) = serde_json::from_str::<StructuredReply>(&repaired) {
                debug!("structured output recovered by repair pass");
                return Ok(reply);
            }
        }
        Err(e) => {
            debug!(error = %e, "json repair pass failed");
        }
    }

    if let Some(caps) = FINAL_RESPONSE_RE.captures(candidate) {
        let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let extracted = unescape_json_string(raw);
        warn!("structured output recovered by emergency field extraction");
        return Ok(StructuredReply {
            final_response: if extracted.trim().is_empty() {
                FALLBACK_RESPONSE.to_string()
            } else {
                extracted
            },
            thoughts: vec!["response recovered from malformed model output".to_string()],
        });
    }

    Err(Error::Decode {
        message: "no parseable JSON and no final_response field found".to_string(),
        preview: bounded_preview(text, DECODE_PREVIEW_CHARS),
    })
}

/// Strip a surrounding markdown code fence if the model wrapped its JSON.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(str::trim_start);
    match inner {
        Some(rest) => rest.strip_suffix("```").map(str::trim).unwrap_or(rest),
        None => trimmed,
    }
}

/// Minimal unescape for regex-extracted JSON string values.
fn unescape_json_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse_succeeds_on_valid_json() {
        let reply =
            recover_structured(r#"{"final_response": "hello", "thoughts": ["a", "b"]}"#).unwrap();
        assert_eq!(reply.final_response, "hello");
        assert_eq!(reply.thoughts, vec!["a", "b"]);
    }

    #[test]
    fn thoughts_default_to_empty() {
        let reply = recover_structured(r#"{"final_response": "hi"}"#).unwrap();
        assert!(reply.thoughts.is_empty());
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let reply = recover_structured(
            "```json\n{\"final_response\": \"fenced\", \"thoughts\": []}\n```",
        )
        .unwrap();
        assert_eq!(reply.final_response, "fenced");
    }

    #[test]
    fn broken_json_recovers_final_response() {
        // Truncated mid-array: repair or emergency extraction must win.
        let reply = recover_structured(r#"{"final_response": "hi", "thoughts": [}"#).unwrap();
        assert!(!reply.final_response.is_empty());
        assert!(reply.final_response.contains("hi") || reply.final_response == FALLBACK_RESPONSE);
    }

    #[test]
    fn emergency_extraction_unescapes() {
        let text = r#"garbage before {"final_response": "line one\nline \"two\"", oops"#;
        let reply = recover_structured(text).unwrap();
        assert_eq!(reply.final_response, "line one\nline \"two\"");
        assert_eq!(reply.thoughts.len(), 1);
    }

    #[test]
    fn empty_extracted_value_falls_back_to_apology() {
        let text = r#"nonsense "final_response": "" nonsense"#;
        let reply = recover_structured(text).unwrap();
        assert_eq!(reply.final_response, FALLBACK_RESPONSE);
    }

    #[test]
    fn hopeless_input_yields_bounded_decode_error() {
        let text = "not json at all ".repeat(100);
        let err = recover_structured(&text).unwrap_err();
        match err {
            Error::Decode { preview, .. } => {
                assert!(preview.chars().count() <= DECODE_PREVIEW_CHARS)
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
