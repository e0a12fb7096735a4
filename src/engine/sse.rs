//! SSE frame decoding for OpenAI-compatible streaming responses.
//!
//! Splits the byte stream on blank-line frame boundaries, strips the
//! `data: ` prefix, stops on `[DONE]`, and parses each payload as JSON.
//! Frames that are comments or non-JSON keep-alives are skipped.

use crate::BoxStream;
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::Value;

const FRAME_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";
const DONE_SIGNAL: &str = "[DONE]";

fn is_done(frame: &str) -> bool {
    let t = frame.trim();
    t == DONE_SIGNAL || t == format!("data: {DONE_SIGNAL}") || t == format!("data:{DONE_SIGNAL}")
}

fn parse_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_done(trimmed) || trimmed.starts_with(':') {
        return None;
    }
    let payload = if let Some(rest) = trimmed.strip_prefix(DATA_PREFIX) {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("data:") {
        rest.trim_start()
    } else {
        trimmed
    };
    serde_json::from_str(payload).ok()
}

/// Decode a raw byte stream into parsed SSE chunk values, preserving arrival
/// order. The stream ends at `[DONE]` or EOF; a transport error is forwarded
/// once and then the stream ends.
pub fn decode_sse(input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value> {
    let stream = stream::unfold(
        (input, String::new()),
        move |(mut input, mut buf)| async move {
            loop {
                // Emit the next complete frame from the buffer, if any.
                if let Some(idx) = buf.find(FRAME_DELIMITER) {
                    let frame = buf[..idx].to_string();
                    buf = buf[idx + FRAME_DELIMITER.len()..].to_string();

                    if is_done(&frame) {
                        return None;
                    }
                    if let Some(v) = parse_payload(&frame) {
                        return Some((Ok(v), (input, buf)));
                    }
                    continue;
                }

                match input.next().await {
                    Some(Ok(bytes)) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (input, buf)));
                    }
                    None => {
                        // EOF: one last attempt on the remaining buffer.
                        if is_done(&buf) {
                            return None;
                        }
                        if let Some(v) = parse_payload(&buf) {
                            return Some((Ok(v), (input, String::new())));
                        }
                        return None;
                    }
                }
            }
        },
    );

    Box::pin(stream)
}

/// Extract the two delta channels from one parsed chunk:
/// `choices[0].delta.content` and `choices[0].delta.reasoning_content`.
pub fn delta_channels(chunk: &Value) -> (Option<&str>, Option<&str>) {
    let delta = chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"));
    match delta {
        Some(d) => (
            d.get("content").and_then(Value::as_str),
            d.get("reasoning_content").and_then(Value::as_str),
        ),
        None => (None, None),
    }
}

/// Wrap an in-memory chunk list as a byte stream (test helper shape shared
/// with integration tests).
#[cfg(test)]
pub(crate) fn bytes_stream_from(chunks: Vec<&'static str>) -> BoxStream<'static, Bytes> {
    Box::pin(stream::iter(
        chunks
            .into_iter()
            .map(|s| Ok::<Bytes, crate::Error>(Bytes::from(s))),
    ))
}
