//! Flat textual summaries of folded turns.
//!
//! A summary is a transcript of the folded turns with everything that does not
//! read as prose removed: text blocks and tool output stay, tool invocations
//! and images are dropped. No LLM call is involved, so a summary is cheap to
//! re-render whenever the set of folded turns changes.

use super::turn::Turn;
use crate::{ContentBlock, Message, MessageContent, value_text};

/// Assistant reply that follows the synthesized summary message.
pub const SUMMARY_ACKNOWLEDGEMENT: &str = "I understand. I'll keep this context in mind.";

/// Render turns as alternating `User:` / `Assistant:` lines, in order.
pub fn create_summary<'a>(turns: impl IntoIterator<Item = &'a Turn>) -> String {
    let mut lines = Vec::new();
    for turn in turns {
        lines.push(format!("User: {}", message_to_text(turn.user())));
        lines.push(format!("Assistant: {}", message_to_text(turn.assistant())));
    }
    lines.join("\n")
}

/// Flatten a message to the text worth keeping in a summary.
///
/// Text blocks and stringified tool-result content are joined with a single
/// space; tool-use, image and unknown blocks contribute nothing.
pub fn message_to_text(message: &Message) -> String {
    match &message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text, .. } => Some(text.clone()),
                ContentBlock::ToolResult { content, .. } => Some(value_text(content).into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Build the user/assistant pair that stands in for all folded turns.
pub fn summary_messages(summary: String) -> [Message; 2] {
    [
        Message::user(summary),
        Message::assistant(SUMMARY_ACKNOWLEDGEMENT),
    ]
}
