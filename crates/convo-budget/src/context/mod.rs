//! Context window management: estimation, compression, summaries, budget.
//!
//! The context window is the scarcest resource in a long-running chat agent.
//! This module keeps usage under control in layers:
//!
//! 1. **[`estimator`]** maps messages to a heuristic token count. Every other
//!    layer measures with it.
//!
//! 2. **[`compress`]** truncates oversized tool output (and code blocks) as a
//!    turn arrives, keeping head and tail around an omission marker.
//!
//! 3. **[`summarizer`]** renders a batch of old turns as a flat
//!    `User:` / `Assistant:` transcript with tool calls and images removed.
//!
//! 4. **[`manager`]** ties them together: [`ContextManager`] stores turns,
//!    tracks the budget described by [`ContextConfig`], and folds everything
//!    but the most recent turns into a summary once the fill ratio crosses the
//!    configured threshold.

pub mod budget;
pub mod compress;
pub mod estimator;
pub mod manager;
pub mod summarizer;
pub mod turn;
pub mod usage;

// Re-export commonly used items at the module level.
pub use budget::{ContextConfig, ContextUsage};
pub use estimator::{
    DEFAULT_CHARS_PER_TOKEN, estimate_message_tokens, estimate_tokens, estimate_total_tokens,
};
pub use manager::{ContextManager, ContextStats};
pub use turn::Turn;
pub use usage::UsageTotals;
