//! Budget policy for a conversation and point-in-time usage snapshots.
//!
//! [`ContextConfig`] is fixed for the life of a
//! [`ContextManager`](super::ContextManager): how large the model's window is,
//! how much of it to hold back for the reply, when to start compacting, how
//! many recent turns are untouchable, and how aggressively to truncate
//! oversized content as it arrives.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

/// Default context window size in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 180_000;

/// Default headroom kept free for the model's reply.
pub const DEFAULT_RESERVE_TOKENS: usize = 32_000;

/// Default fill ratio at which automatic compaction starts.
pub const DEFAULT_SUMMARIZE_THRESHOLD: f64 = 0.7;

/// Default number of trailing turns that are never compacted.
pub const DEFAULT_KEEP_RECENT: usize = 10;

/// Default line limit for code blocks.
pub const DEFAULT_CODE_BLOCK_MAX_LINES: usize = 50;

/// Default character limit for tool output.
pub const DEFAULT_TOOL_OUTPUT_MAX_CHARS: usize = 2_000;

/// Budget and compaction policy for one conversation.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// wants to change.
///
/// # Example
///
/// ```
/// use convo_budget::context::ContextConfig;
///
/// let config = ContextConfig::default()
///     .with_max_tokens(128_000)
///     .with_reserve_tokens(8_192)
///     .with_summarize_threshold(0.8)
///     .with_keep_recent(6);
///
/// assert_eq!(config.effective_max_tokens(), 128_000 - 8_192);
/// assert_eq!(config.compaction_threshold_tokens(), 102_400);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Model context window in tokens.
    pub max_tokens: usize,
    /// Tokens held back from the budget for the model's own reply.
    pub reserve_tokens: usize,
    /// Fraction of `max_tokens` (0 to 1) at which automatic compaction runs.
    pub summarize_threshold: f64,
    /// Number of most recent turns that compaction never folds.
    pub keep_recent_messages: usize,
    /// Line limit for [`compress_code_block`](super::compress::compress_code_block).
    pub code_block_max_lines: usize,
    /// Character limit for tool-result output compressed on arrival.
    pub tool_output_max_chars: usize,
    /// Compress oversized tool output as each turn is added.
    pub enable_incremental_compression: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            reserve_tokens: DEFAULT_RESERVE_TOKENS,
            summarize_threshold: DEFAULT_SUMMARIZE_THRESHOLD,
            keep_recent_messages: DEFAULT_KEEP_RECENT,
            code_block_max_lines: DEFAULT_CODE_BLOCK_MAX_LINES,
            tool_output_max_chars: DEFAULT_TOOL_OUTPUT_MAX_CHARS,
            enable_incremental_compression: true,
        }
    }
}

impl ContextConfig {
    /// Override the context window size (in tokens).
    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Set tokens reserved for the model's reply.
    pub fn with_reserve_tokens(mut self, tokens: usize) -> Self {
        self.reserve_tokens = tokens;
        self
    }

    /// Set the fill ratio that triggers automatic compaction.
    pub fn with_summarize_threshold(mut self, threshold: f64) -> Self {
        self.summarize_threshold = threshold;
        self
    }

    /// Set how many recent turns are protected from compaction.
    pub fn with_keep_recent(mut self, turns: usize) -> Self {
        self.keep_recent_messages = turns;
        self
    }

    pub fn with_code_block_max_lines(mut self, lines: usize) -> Self {
        self.code_block_max_lines = lines;
        self
    }

    pub fn with_tool_output_max_chars(mut self, chars: usize) -> Self {
        self.tool_output_max_chars = chars;
        self
    }

    /// Enable or disable compression of tool output on arrival.
    pub fn with_incremental_compression(mut self, enabled: bool) -> Self {
        self.enable_incremental_compression = enabled;
        self
    }

    /// Context window minus the reply reserve, floored at zero.
    pub fn effective_max_tokens(&self) -> usize {
        self.max_tokens.saturating_sub(self.reserve_tokens)
    }

    /// Used-token count at which automatic compaction runs:
    /// `floor(max_tokens * summarize_threshold)`.
    pub fn compaction_threshold_tokens(&self) -> usize {
        (self.max_tokens as f64 * self.summarize_threshold) as usize
    }

    /// Check that the settings are usable.
    ///
    /// A reserve at or above `max_tokens` is accepted: it only means the
    /// available budget is never positive.
    pub fn validate(&self) -> ContextResult<()> {
        if !self.summarize_threshold.is_finite() || !(0.0..=1.0).contains(&self.summarize_threshold)
        {
            return Err(ContextError::InvalidConfig(format!(
                "summarize_threshold must be between 0 and 1, got {}",
                self.summarize_threshold
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> ContextResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ContextResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Snapshot of budget consumption at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUsage {
    /// Tokens counted against the budget.
    pub used_tokens: usize,
    /// `max_tokens - reserve_tokens - used_tokens`; negative on overflow.
    pub available_tokens: i64,
    /// Configured context window.
    pub max_tokens: usize,
    /// `used_tokens / max_tokens` (1.0 when the window is zero).
    pub fill_ratio: f64,
}

impl ContextUsage {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.0}% of {}), {} available",
            self.used_tokens,
            self.fill_ratio * 100.0,
            self.max_tokens,
            self.available_tokens,
        )
    }
}
