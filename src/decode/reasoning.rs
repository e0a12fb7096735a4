//! Delimiter-tag segmentation of reasoning vs. final answer.
//!
//! Implemented as an explicit two-state scan rather than index arithmetic.
//! The close tag is authoritative: text terminated by a close tag belongs to
//! the reasoning channel even when no open tag preceded it (providers
//! regularly drop the opening marker when the very first token is already
//! inside the think block).

use super::{REASONING_CLOSE_TAG, REASONING_OPEN_TAG};

/// Output of [`split_reasoning`]: the reasoning channel (possibly several
/// segments joined by newline) and whatever remains as the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segmented {
    pub reasoning: String,
    pub final_text: String,
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Outside,
    InsideReasoning,
}

/// Split with the default `<think>`/`</think>` pair.
pub fn split_reasoning(text: &str) -> Segmented {
    split_reasoning_with(text, REASONING_OPEN_TAG, REASONING_CLOSE_TAG)
}

/// Split `text` into reasoning and final answer using a custom tag pair.
///
/// Case behavior, in priority order:
/// 1. open..close present in order: between is reasoning, after close is final;
/// 2. lone close tag: everything before it is reasoning, after it final;
/// 3. several close tags (paired or not): each span ending at a close tag is
///    one reasoning segment, joined by `\n`; final is what trails the last
///    close tag;
/// 4. no tags: the whole text is final, reasoning empty.
///
/// Nothing after the last close tag means an empty final answer; text is
/// returned exactly as found, untrimmed.
pub fn split_reasoning_with(text: &str, open_tag: &str, close_tag: &str) -> Segmented {
    if !text.contains(open_tag) && !text.contains(close_tag) {
        return Segmented {
            reasoning: String::new(),
            final_text: text.to_string(),
        };
    }

    let mut state = ScanState::Outside;
    let mut reasoning_segments: Vec<&str> = Vec::new();
    let mut final_parts = String::new();
    let mut cursor = 0;

    loop {
        let rest = &text[cursor..];
        let next_open = rest.find(open_tag);
        let next_close = rest.find(close_tag);

        match state {
            ScanState::Outside => {
                // An open tag is the next boundary only when no close tag
                // precedes it; a close tag wins otherwise (implicit open).
                let open_first = match (next_open, next_close) {
                    (Some(o), Some(c)) => o < c,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if open_first {
                    let o = next_open.unwrap_or(0);
                    final_parts.push_str(&rest[..o]);
                    cursor += o + open_tag.len();
                    state = ScanState::InsideReasoning;
                } else if let Some(c) = next_close {
                    // The span since the last boundary was reasoning with an
                    // implicit open.
                    reasoning_segments.push(&rest[..c]);
                    cursor += c + close_tag.len();
                } else {
                    final_parts.push_str(rest);
                    break;
                }
            }
            ScanState::InsideReasoning => match next_close {
                Some(c) => {
                    reasoning_segments.push(&rest[..c]);
                    cursor += c + close_tag.len();
                    state = ScanState::Outside;
                }
                // Unclosed open tag: the stream ended mid-think.
                None => {
                    reasoning_segments.push(rest);
                    break;
                }
            },
        }
    }

    Segmented {
        reasoning: reasoning_segments.join("\n"),
        final_text: final_parts,
    }
}
