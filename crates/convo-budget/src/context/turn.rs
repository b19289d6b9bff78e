//! A stored user/assistant exchange and its compaction state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Message, TokenUsage};

/// One completed round trip, as held by the
/// [`ContextManager`](super::ContextManager).
///
/// Fields are read-only from outside the crate. The only state change after
/// creation is [`fold_into_summary`](Self::fold_into_summary), which moves a
/// turn from "sent verbatim" to "represented by a summary" and never back.
#[derive(Serialize, Clone, Debug)]
pub struct Turn {
    user: Message,
    assistant: Message,
    timestamp: DateTime<Utc>,
    token_estimate: usize,
    original_tokens: usize,
    compressed: bool,
    summarized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<TokenUsage>,
}

impl Turn {
    pub(crate) fn new(
        user: Message,
        assistant: Message,
        token_estimate: usize,
        original_tokens: usize,
        compressed: bool,
        usage: Option<TokenUsage>,
    ) -> Self {
        debug_assert!(token_estimate <= original_tokens);
        Self {
            user,
            assistant,
            timestamp: Utc::now(),
            token_estimate,
            original_tokens,
            compressed,
            summarized: false,
            summary: None,
            usage,
        }
    }

    /// Mark this turn as folded into `summary`.
    ///
    /// Returns `true` if the turn was newly folded. A turn that is already
    /// summarized keeps the summary it was folded with and returns `false`.
    pub(crate) fn fold_into_summary(&mut self, summary: &str) -> bool {
        if self.summarized {
            return false;
        }
        self.summarized = true;
        self.summary = Some(summary.to_string());
        true
    }

    pub fn user(&self) -> &Message {
        &self.user
    }

    pub fn assistant(&self) -> &Message {
        &self.assistant
    }

    /// When the turn was added.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Estimated tokens of the pair as stored (after any compression).
    pub fn token_estimate(&self) -> usize {
        self.token_estimate
    }

    /// Estimated tokens of the pair before compression.
    pub fn original_tokens(&self) -> usize {
        self.original_tokens
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn is_summarized(&self) -> bool {
        self.summarized
    }

    /// The summary this turn was folded with, if any.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Usage the LLM reported for this turn, if the caller supplied it.
    pub fn usage(&self) -> Option<&TokenUsage> {
        self.usage.as_ref()
    }
}
