//! Recorded conversations and replaying them through a manager.
//!
//! A transcript is a JSON array of completed round trips:
//!
//! ```json
//! [
//!   {
//!     "user": {"role": "user", "content": "List the files."},
//!     "assistant": {"role": "assistant", "content": [{"type": "text", "text": "Sure."}]},
//!     "usage": {"input_tokens": 812, "output_tokens": 64}
//!   }
//! ]
//! ```
//!
//! `usage` is optional. Replaying feeds each entry to
//! [`ContextManager::add_turn`] in order, so compaction behaves exactly as it
//! would have live.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ContextManager;
use crate::error::ContextResult;
use crate::{Message, TokenUsage};

/// One recorded round trip.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranscriptTurn {
    pub user: Message,
    pub assistant: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Parse a transcript from a JSON string.
pub fn parse_transcript(json: &str) -> ContextResult<Vec<TranscriptTurn>> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a transcript file.
pub fn load_transcript(path: impl AsRef<Path>) -> ContextResult<Vec<TranscriptTurn>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let turns = parse_transcript(&text)?;
    debug!("Loaded {} turn(s) from {}", turns.len(), path.display());
    Ok(turns)
}

/// Feed recorded turns to `manager` in order. Returns how many were added.
pub fn replay(
    manager: &mut ContextManager,
    turns: impl IntoIterator<Item = TranscriptTurn>,
) -> usize {
    let mut count = 0;
    for turn in turns {
        manager.add_turn(turn.user, turn.assistant, turn.usage);
        count += 1;
    }
    count
}
