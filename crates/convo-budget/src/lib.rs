//! Token budget and compaction engine for turn-based LLM conversations.
//!
//! `convo-budget` keeps a chat agent's conversation inside a model's finite
//! context window. Every completed round trip (user message + assistant
//! reply) is recorded as a [`Turn`](context::Turn) with an estimated token
//! cost; when the running total crosses a configurable fill ratio, older turns
//! are folded into a compact textual summary so the conversation can continue
//! indefinitely.
//!
//! The engine is synchronous and does no I/O. The LLM client that performs the
//! network call lives outside this crate: it hands completed turns (and, when
//! it has them, the real [`TokenUsage`] the API reported) to a
//! [`ContextManager`](context::ContextManager) and asks it for the message
//! sequence to send next.
//!
//! # Getting started
//!
//! ```
//! use convo_budget::prelude::*;
//!
//! let config = ContextConfig::default()
//!     .with_max_tokens(8_000)
//!     .with_reserve_tokens(1_000)
//!     .with_keep_recent(4);
//!
//! let mut manager = ContextManager::new(config);
//! manager.set_system_prompt("You are a helpful coding assistant.");
//!
//! manager.add_turn(
//!     Message::user("Read src/main.rs and summarize it."),
//!     Message::assistant("It parses the CLI and starts the server."),
//!     Some(TokenUsage::new(120, 40)),
//! );
//!
//! let outbound = manager.get_messages();
//! assert_eq!(outbound.len(), 2);
//! assert!(manager.get_available_tokens() > 0);
//! ```
//!
//! # Where to find things
//!
//! - **Estimate tokens:** [`context::estimator`] has the character-ratio
//!   heuristic used everywhere else in the crate.
//! - **Shrink oversized content:** [`context::compress`] truncates long tool
//!   output and code blocks around an omission marker.
//! - **Render summaries:** [`context::summarizer::create_summary`] flattens a
//!   batch of turns into `User:` / `Assistant:` lines.
//! - **Manage a conversation:** [`ContextManager`](context::ContextManager)
//!   owns the turn store, the budget, and the compaction policy.
//! - **Load settings / transcripts:** [`ContextConfig`](context::ContextConfig)
//!   reads partial JSON files; [`transcript`] replays recorded conversations.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Estimator, compressor, summarizer, budget config, turn store and manager |
//! | [`transcript`] | Loading and replaying recorded conversations |
//! | [`error`] | [`ContextError`] and the [`ContextResult`] alias |

pub mod context;
pub mod error;
pub mod prelude;
pub mod transcript;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub use error::{ContextError, ContextResult};

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in a stored turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Body of a message: either a plain string or an ordered list of blocks.
///
/// Serialized untagged, matching the messages API wire shape where
/// `content` is `"..."` or `[{"type": ...}, ...]`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        MessageContent::Blocks(blocks)
    }
}

/// Fields of a known block type that this crate does not model, such as
/// `cache_control` or a tool result's `is_error`. Kept so they serialize
/// back unchanged.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// A single typed block inside block-sequence content.
///
/// Blocks are forwarded to the next LLM call exactly as they arrived. Fields
/// a known variant does not model land in its `extra` map, and blocks of any
/// other type (or a known type with an unexpected shape) are kept whole as
/// [`ContentBlock::Unknown`]. Unknown blocks cost nothing and never appear in
/// summaries.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    Image {
        #[serde(default)]
        source: serde_json::Value,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    /// Any other block, `type` key included.
    #[serde(untagged)]
    Unknown(serde_json::Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            extra: ExtraFields::new(),
        }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
            extra: ExtraFields::new(),
        }
    }

    /// A tool result. Strings become plain string output; any other JSON is
    /// kept as structured content.
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<serde_json::Value>,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            extra: ExtraFields::new(),
        }
    }

    pub fn image(source: serde_json::Value) -> Self {
        ContentBlock::Image {
            source,
            extra: ExtraFields::new(),
        }
    }
}

/// A message in a conversation turn.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Plain-text body, if this message is not block-sequence content.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(_) => None,
        }
    }
}

/// Render a JSON value as text: strings verbatim, anything else as JSON.
pub(crate) fn value_text(value: &serde_json::Value) -> Cow<'_, str> {
    match value {
        serde_json::Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

// ── Usage types ────────────────────────────────────────────────────

/// Token usage the LLM reported for one completed call.
///
/// When supplied to [`ContextManager::add_turn`](context::ContextManager::add_turn)
/// it replaces the heuristic estimate for that turn in budget accounting.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    pub fn with_cache_read(mut self, tokens: u64) -> Self {
        self.cache_read_tokens = Some(tokens);
        self
    }

    pub fn with_cache_creation(mut self, tokens: u64) -> Self {
        self.cache_creation_tokens = Some(tokens);
        self
    }

    pub fn with_thinking(mut self, tokens: u64) -> Self {
        self.thinking_tokens = Some(tokens);
        self
    }

    /// Sum of every counter; absent optional counters count as zero.
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.cache_creation_tokens.unwrap_or(0)
            + self.cache_read_tokens.unwrap_or(0)
            + self.output_tokens
            + self.thinking_tokens.unwrap_or(0)
    }
}
