//! Cumulative tally of the token usage the LLM reported across a conversation.
//!
//! Per-turn [`TokenUsage`] drives budget accounting; this tracker keeps the
//! running totals a caller wants for logging or cost reports.

use serde::Serialize;

use crate::TokenUsage;

/// Running totals of reported [`TokenUsage`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub thinking_tokens: u64,
    /// Number of calls that reported usage.
    pub calls: u64,
}

impl UsageTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record usage for one call.
    pub fn record(&mut self, usage: &TokenUsage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cache_read_tokens += usage.cache_read_tokens.unwrap_or(0);
        self.cache_creation_tokens += usage.cache_creation_tokens.unwrap_or(0);
        self.thinking_tokens += usage.thinking_tokens.unwrap_or(0);
        self.calls += 1;
    }

    /// Total tokens across every counter.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_tokens
            + self.cache_creation_tokens
            + self.thinking_tokens
    }

    /// Share of cached prompt tokens that were reads rather than writes.
    pub fn cache_hit_rate(&self) -> f64 {
        let cached = self.cache_read_tokens + self.cache_creation_tokens;
        if cached == 0 {
            0.0
        } else {
            self.cache_read_tokens as f64 / cached as f64
        }
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "usage: {} input + {} output = {} total over {} call(s), cache hit rate {:.1}%",
            self.input_tokens,
            self.output_tokens,
            self.total_tokens(),
            self.calls,
            self.cache_hit_rate() * 100.0,
        )
    }
}
