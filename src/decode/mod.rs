//! Recovery of structured results from raw streamed text.
//!
//! Two independent, pure policies (no I/O, fully unit-testable):
//!
//! - [`split_reasoning`]: separate delimiter-tagged "thinking" text from the
//!   final answer when the provider folds both into one channel.
//! - [`recover_structured`]: strict JSON parse, then lenient repair, then
//!   emergency regex extraction of the known `final_response` field.

mod reasoning;
mod structured;

pub use reasoning::{split_reasoning, split_reasoning_with, Segmented};
pub use structured::{recover_structured, StructuredReply};

/// Default delimiter pair used by reasoning-capable providers.
pub const REASONING_OPEN_TAG: &str = "<think>";
pub const REASONING_CLOSE_TAG: &str = "</think>";
