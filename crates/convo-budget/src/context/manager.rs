//! The conversation store and its compaction policy.
//!
//! [`ContextManager`] owns the ordered list of [`Turn`]s for one conversation.
//! Each added turn is estimated (and, if enabled, has oversized tool output
//! truncated), appended, and then the fill ratio is checked. Once used tokens
//! reach `floor(max_tokens * summarize_threshold)`, a compaction pass folds
//! every turn except the most recent `keep_recent_messages` into a textual
//! summary.
//!
//! Folded turns are never dropped. [`get_messages`](ContextManager::get_messages)
//! replaces all of them with a single freshly rendered summary pair and sends
//! the rest verbatim.
//!
//! # Accounting
//!
//! Budget accounting prefers ground truth: a turn with reported
//! [`TokenUsage`] counts its reported total instead of the heuristic estimate.
//! A folded turn counts the estimate of the summary it was folded with.
//!
//! Each pass attaches its own batch summary to every turn it newly folds, and
//! each of those turns counts that summary. `get_messages`, on the other hand,
//! sends one combined summary of all folded turns. Once anything is folded,
//! [`get_used_tokens`](ContextManager::get_used_tokens) is therefore larger
//! than the estimate of what is actually sent; it never under-counts.
//!
//! # Passes
//!
//! A pass runs only if there is at least one not-yet-folded turn outside the
//! protected tail. Calling [`compact`](ContextManager::compact) again without
//! adding turns changes nothing: no counters move and no summaries change.

use serde::Serialize;
use tracing::{debug, info, trace};

use super::budget::{ContextConfig, ContextUsage};
use super::compress::compress_message;
use super::estimator::{estimate_message_tokens, estimate_tokens};
use super::summarizer::{create_summary, summary_messages};
use super::turn::Turn;
use super::usage::UsageTotals;
use crate::error::ContextResult;
use crate::{Message, TokenUsage};

/// Derived snapshot of a manager's state. Computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStats {
    /// Stored messages: two per turn, folded or not.
    pub total_messages: usize,
    /// Tokens currently counted against the budget.
    pub estimated_tokens: usize,
    /// Messages belonging to folded turns.
    pub summarized_messages: usize,
    /// Current tokens over pre-compression tokens (1.0 with no turns).
    pub compression_ratio: f64,
    /// Cumulative tokens saved by compression and compaction.
    pub saved_tokens: usize,
    /// Number of compaction passes that ran.
    pub compression_count: usize,
}

impl ContextStats {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "messages: {} ({} summarized), ~{} tokens, ratio {:.2}, saved {} over {} compaction(s)",
            self.total_messages,
            self.summarized_messages,
            self.estimated_tokens,
            self.compression_ratio,
            self.saved_tokens,
            self.compression_count,
        )
    }
}

/// Token budget and compaction engine for one conversation.
///
/// Create one per conversation; instances share nothing.
///
/// # Example
///
/// ```
/// use convo_budget::prelude::*;
///
/// let config = ContextConfig::default()
///     .with_max_tokens(1_000)
///     .with_reserve_tokens(0)
///     .with_keep_recent(2);
/// let mut manager = ContextManager::new(config);
///
/// for i in 0..5 {
///     manager.add_turn(
///         Message::user(format!("question {i}")),
///         Message::assistant(format!("answer {i}")),
///         None,
///     );
/// }
/// manager.compact();
///
/// // One summary pair for the three folded turns, then two verbatim turns.
/// assert_eq!(manager.get_messages().len(), 2 + 4);
/// assert_eq!(manager.get_stats().compression_count, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ContextManager {
    config: ContextConfig,
    turns: Vec<Turn>,
    system_prompt: String,
    saved_tokens: usize,
    compression_count: usize,
    usage_totals: UsageTotals,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl ContextManager {
    /// Create a manager with the given policy. The config is not validated;
    /// use [`try_new`](Self::try_new) for user-supplied settings.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            turns: Vec::new(),
            system_prompt: String::new(),
            saved_tokens: 0,
            compression_count: 0,
            usage_totals: UsageTotals::new(),
        }
    }

    /// Validate `config` and create a manager with it.
    pub fn try_new(config: ContextConfig) -> ContextResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Replace the system prompt counted in budget accounting.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// All stored turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Running totals of every usage record passed to [`add_turn`](Self::add_turn).
    pub fn usage_totals(&self) -> &UsageTotals {
        &self.usage_totals
    }

    /// Record a completed round trip.
    ///
    /// `usage` is what the LLM reported for the call, if known; it takes
    /// precedence over the heuristic estimate in budget accounting. After the
    /// turn is stored, automatic compaction runs if the threshold is reached.
    pub fn add_turn(&mut self, user: Message, assistant: Message, usage: Option<TokenUsage>) {
        let original_tokens = estimate_message_tokens(&user) + estimate_message_tokens(&assistant);

        let (user, assistant, token_estimate, compressed) =
            if self.config.enable_incremental_compression {
                let packed_user = compress_message(&user, &self.config);
                let packed_assistant = compress_message(&assistant, &self.config);
                let packed_tokens = estimate_message_tokens(&packed_user)
                    + estimate_message_tokens(&packed_assistant);
                if packed_tokens < original_tokens {
                    let saved = original_tokens - packed_tokens;
                    self.saved_tokens += saved;
                    debug!(
                        "Compressed turn {}: {} -> {} tokens (saved {})",
                        self.turns.len(),
                        original_tokens,
                        packed_tokens,
                        saved
                    );
                    (packed_user, packed_assistant, packed_tokens, true)
                } else {
                    (user, assistant, original_tokens, false)
                }
            } else {
                (user, assistant, original_tokens, false)
            };

        if let Some(ref reported) = usage {
            self.usage_totals.record(reported);
        }

        self.turns.push(Turn::new(
            user,
            assistant,
            token_estimate,
            original_tokens,
            compressed,
            usage,
        ));
        trace!("Added turn {} (~{} tokens)", self.turns.len() - 1, token_estimate);

        self.maybe_compact();
    }

    /// Build the message sequence for the next LLM call.
    ///
    /// If any turns are folded, the sequence opens with one user message
    /// holding a summary of all of them and a fixed assistant
    /// acknowledgement. Every unfolded turn follows in order. Rendered fresh
    /// on each call.
    pub fn get_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2 + 2);

        if self.turns.iter().any(Turn::is_summarized) {
            let summary = create_summary(self.turns.iter().filter(|t| t.is_summarized()));
            messages.extend(summary_messages(summary));
        }

        for turn in self.turns.iter().filter(|t| !t.is_summarized()) {
            messages.push(turn.user().clone());
            messages.push(turn.assistant().clone());
        }

        messages
    }

    /// Tokens currently counted against the budget.
    ///
    /// System prompt estimate, plus per turn: the estimate of its own summary
    /// if folded, else its reported usage total if known, else its stored
    /// estimate.
    pub fn get_used_tokens(&self) -> usize {
        estimate_tokens(&self.system_prompt)
            + self.turns.iter().map(turn_budget_tokens).sum::<usize>()
    }

    /// `max_tokens - reserve_tokens - used`. Negative means the conversation
    /// no longer fits.
    pub fn get_available_tokens(&self) -> i64 {
        self.config.max_tokens as i64
            - self.config.reserve_tokens as i64
            - self.get_used_tokens() as i64
    }

    /// Snapshot of budget consumption.
    pub fn usage(&self) -> ContextUsage {
        let used_tokens = self.get_used_tokens();
        let fill_ratio = if self.config.max_tokens > 0 {
            used_tokens as f64 / self.config.max_tokens as f64
        } else {
            1.0
        };
        ContextUsage {
            used_tokens,
            available_tokens: self.get_available_tokens(),
            max_tokens: self.config.max_tokens,
            fill_ratio,
        }
    }

    /// Whether used tokens have reached the automatic compaction threshold.
    pub fn needs_compaction(&self) -> bool {
        self.get_used_tokens() >= self.config.compaction_threshold_tokens()
    }

    /// Run a compaction pass regardless of the fill ratio.
    ///
    /// Returns `true` if a pass ran, `false` if every turn outside the
    /// protected tail was already folded (or there is no such turn).
    pub fn compact(&mut self) -> bool {
        self.run_compaction()
    }

    pub fn get_stats(&self) -> ContextStats {
        let used = self.get_used_tokens();
        let original: usize = self.turns.iter().map(Turn::original_tokens).sum();
        let summarized = self.turns.iter().filter(|t| t.is_summarized()).count();

        ContextStats {
            total_messages: self.turns.len() * 2,
            estimated_tokens: used,
            summarized_messages: summarized * 2,
            compression_ratio: if original > 0 {
                used as f64 / original as f64
            } else {
                1.0
            },
            saved_tokens: self.saved_tokens,
            compression_count: self.compression_count,
        }
    }

    /// Drop all turns and counters. The system prompt is kept.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.saved_tokens = 0;
        self.compression_count = 0;
        self.usage_totals = UsageTotals::new();
        debug!("Context reset");
    }

    fn maybe_compact(&mut self) {
        let used = self.get_used_tokens();
        let threshold = self.config.compaction_threshold_tokens();
        if used < threshold {
            trace!("Compaction not needed: {} < {} tokens", used, threshold);
            return;
        }
        debug!("Compaction threshold reached: {} >= {} tokens", used, threshold);
        self.run_compaction();
    }

    fn run_compaction(&mut self) -> bool {
        let keep = self.config.keep_recent_messages;
        if self.turns.len() <= keep {
            trace!(
                "Compaction skipped: {} turn(s) within the {}-turn tail",
                self.turns.len(),
                keep
            );
            return false;
        }

        let boundary = self.turns.len() - keep;
        let batch = &mut self.turns[..boundary];
        if batch.iter().all(Turn::is_summarized) {
            trace!("Compaction skipped: all {} eligible turn(s) already folded", boundary);
            return false;
        }

        let before_tokens: usize = batch.iter().map(Turn::token_estimate).sum();
        let summary = create_summary(batch.iter());

        let mut folded = 0;
        for turn in batch.iter_mut() {
            if turn.fold_into_summary(&summary) {
                folded += 1;
            }
        }

        let after_tokens = estimate_tokens(&summary);
        let saved = before_tokens.saturating_sub(after_tokens);
        self.saved_tokens += saved;
        self.compression_count += 1;

        info!(
            "Compaction #{}: folded {} new turn(s), {} eligible, ~{} -> ~{} tokens",
            self.compression_count, folded, boundary, before_tokens, after_tokens
        );
        true
    }
}

/// Tokens one turn contributes to the budget.
fn turn_budget_tokens(turn: &Turn) -> usize {
    if turn.is_summarized()
        && let Some(summary) = turn.summary()
    {
        return estimate_tokens(summary);
    }
    match turn.usage() {
        Some(usage) => usage.total() as usize,
        None => turn.token_estimate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentBlock;

    /// A message whose estimate is exactly 40 tokens (30 for text + 10 overhead).
    fn forty(role_user: bool) -> Message {
        let text = "a".repeat(105);
        if role_user {
            Message::user(text)
        } else {
            Message::assistant(text)
        }
    }

    fn small_config() -> ContextConfig {
        ContextConfig::default()
            .with_max_tokens(1_000)
            .with_reserve_tokens(0)
            .with_summarize_threshold(0.7)
            .with_keep_recent(10)
    }

    #[test]
    fn turn_estimate_is_sum_of_messages() {
        let mut manager = ContextManager::new(small_config());
        manager.add_turn(forty(true), forty(false), None);
        assert_eq!(manager.turns()[0].token_estimate(), 80);
        assert_eq!(manager.get_used_tokens(), 80);
    }

    #[test]
    fn system_prompt_counts_toward_budget() {
        let mut manager = ContextManager::new(small_config());
        manager.set_system_prompt("hello world");
        assert_eq!(manager.get_used_tokens(), 4);
        assert_eq!(manager.get_available_tokens(), 996);
        assert_eq!(manager.system_prompt(), "hello world");
    }

    #[test]
    fn reported_usage_overrides_estimate() {
        let mut manager = ContextManager::new(small_config());
        manager.add_turn(
            forty(true),
            forty(false),
            Some(TokenUsage::new(50, 20).with_cache_read(5)),
        );
        assert_eq!(manager.get_used_tokens(), 75);
        assert_eq!(manager.usage_totals().calls, 1);
    }

    #[test]
    fn no_pass_below_threshold() {
        let mut manager = ContextManager::new(small_config().with_keep_recent(1));
        for _ in 0..8 {
            manager.add_turn(forty(true), forty(false), None);
        }
        // 8 * 80 = 640 < 700.
        assert!(!manager.needs_compaction());
        assert_eq!(manager.get_stats().compression_count, 0);
        assert!(manager.turns().iter().all(|t| !t.is_summarized()));
    }

    #[test]
    fn pass_runs_once_threshold_reached() {
        let mut manager = ContextManager::new(small_config().with_keep_recent(1));
        for _ in 0..9 {
            manager.add_turn(forty(true), forty(false), None);
        }
        let stats = manager.get_stats();
        assert_eq!(stats.compression_count, 1);
        assert_eq!(stats.summarized_messages, 16);
        assert!(!manager.turns()[8].is_summarized());
    }

    #[test]
    fn compact_is_noop_within_tail() {
        let mut manager = ContextManager::new(small_config());
        for _ in 0..10 {
            manager.add_turn(forty(true), forty(false), None);
        }
        assert!(!manager.compact());
        let stats = manager.get_stats();
        assert_eq!(stats.compression_count, 0);
        assert_eq!(stats.summarized_messages, 0);
    }

    #[test]
    fn repeated_compact_without_new_turns_changes_nothing() {
        let mut manager =
            ContextManager::new(small_config().with_max_tokens(100_000).with_keep_recent(2));
        for _ in 0..6 {
            manager.add_turn(forty(true), forty(false), None);
        }
        assert!(manager.compact());
        let first = manager.get_stats();
        let summaries: Vec<Option<String>> = manager
            .turns()
            .iter()
            .map(|t| t.summary().map(str::to_string))
            .collect();

        assert!(!manager.compact());
        assert_eq!(manager.get_stats(), first);
        let again: Vec<Option<String>> = manager
            .turns()
            .iter()
            .map(|t| t.summary().map(str::to_string))
            .collect();
        assert_eq!(summaries, again);
    }

    #[test]
    fn later_pass_keeps_earlier_summaries() {
        let mut manager =
            ContextManager::new(small_config().with_max_tokens(100_000).with_keep_recent(2));
        for _ in 0..3 {
            manager.add_turn(forty(true), forty(false), None);
        }
        manager.compact();
        let first_summary = manager.turns()[0].summary().map(str::to_string);

        manager.add_turn(forty(true), forty(false), None);
        manager.compact();

        assert_eq!(manager.turns()[0].summary().map(str::to_string), first_summary);
        assert_ne!(manager.turns()[1].summary().map(str::to_string), first_summary);
        assert_eq!(manager.get_stats().compression_count, 2);
    }

    #[test]
    fn summary_pair_leads_messages() {
        let mut manager =
            ContextManager::new(small_config().with_max_tokens(100_000).with_keep_recent(1));
        manager.add_turn(Message::user("first q"), Message::assistant("first a"), None);
        manager.add_turn(Message::user("second q"), Message::assistant("second a"), None);
        manager.compact();

        let messages = manager.get_messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].as_text(), Some("User: first q\nAssistant: first a"));
        assert_eq!(
            messages[1].as_text(),
            Some(crate::context::summarizer::SUMMARY_ACKNOWLEDGEMENT)
        );
        assert_eq!(messages[2].as_text(), Some("second q"));
        assert_eq!(messages[3].as_text(), Some("second a"));
    }

    #[test]
    fn oversized_tool_output_is_compressed_on_arrival() {
        let mut manager =
            ContextManager::new(ContextConfig::default().with_tool_output_max_chars(100));
        manager.add_turn(
            Message::user("run it"),
            Message::assistant(vec![ContentBlock::tool_result("t1", "z".repeat(1_000))]),
            None,
        );
        let turn = &manager.turns()[0];
        assert!(turn.is_compressed());
        assert!(turn.token_estimate() < turn.original_tokens());
        assert_eq!(
            manager.get_stats().saved_tokens,
            turn.original_tokens() - turn.token_estimate()
        );
    }

    #[test]
    fn reset_keeps_system_prompt() {
        let mut manager = ContextManager::new(small_config().with_keep_recent(0));
        manager.set_system_prompt("be brief");
        for _ in 0..10 {
            manager.add_turn(forty(true), forty(false), Some(TokenUsage::new(1, 1)));
        }
        manager.compact();
        manager.reset();

        let stats = manager.get_stats();
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.saved_tokens, 0);
        assert_eq!(stats.compression_count, 0);
        assert_eq!(manager.usage_totals().calls, 0);
        assert_eq!(manager.system_prompt(), "be brief");
        assert_eq!(manager.get_used_tokens(), estimate_tokens("be brief"));
    }

    #[test]
    fn try_new_rejects_bad_threshold() {
        assert!(
            ContextManager::try_new(ContextConfig::default().with_summarize_threshold(1.2))
                .is_err()
        );
        assert!(ContextManager::try_new(ContextConfig::default()).is_ok());
    }

    #[test]
    fn usage_snapshot_reports_fill_ratio() {
        let mut manager = ContextManager::new(small_config());
        manager.add_turn(forty(true), forty(false), None);
        let usage = manager.usage();
        assert_eq!(usage.used_tokens, 80);
        assert_eq!(usage.available_tokens, 920);
        assert!((usage.fill_ratio - 0.08).abs() < 1e-9);

        let empty = ContextManager::new(ContextConfig::default().with_max_tokens(0));
        assert_eq!(empty.usage().fill_ratio, 1.0);
    }

    #[test]
    fn stats_log_string_mentions_counts() {
        let manager = ContextManager::default();
        let line = manager.get_stats().to_log_string();
        assert!(line.contains("messages: 0"));
        assert!(line.contains("0 compaction(s)"));
    }
}
