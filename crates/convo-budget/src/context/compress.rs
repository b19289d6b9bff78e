//! Head/tail truncation of oversized content.
//!
//! Long tool output and pasted code blocks are the bulk of most agent
//! conversations, and their middles are rarely what the model needs next.
//! These helpers keep the beginning and end and replace the middle with a
//! marker that says how much was dropped. The transformation is lossy and
//! one-way: the marker is plain text and is never expanded again.

use std::borrow::Cow;

use super::budget::ContextConfig;
use crate::{ContentBlock, Message, MessageContent};

/// Share of the line budget kept from the start of a code block.
const CODE_HEAD_FRACTION: f64 = 0.6;

/// Share of the character budget kept from the start of tool output.
const OUTPUT_HEAD_FRACTION: f64 = 0.7;

/// Shorten a code block to at most `max_lines` lines plus an omission marker.
///
/// Keeps the first 60% of the budget and fills the rest from the tail.
/// Returns the input unchanged when it already fits.
pub fn compress_code_block(code: &str, max_lines: usize) -> Cow<'_, str> {
    let lines: Vec<&str> = code.split('\n').collect();
    if lines.len() <= max_lines {
        return Cow::Borrowed(code);
    }

    let keep_head = (max_lines as f64 * CODE_HEAD_FRACTION) as usize;
    let keep_tail = max_lines - keep_head;
    let omitted = lines.len() - max_lines;

    let head = lines[..keep_head].join("\n");
    let tail = lines[lines.len() - keep_tail..].join("\n");
    Cow::Owned(format!("{head}\n\n... [{omitted} lines omitted] ...\n\n{tail}"))
}

/// Shorten tool output to at most `max_chars` characters plus an omission marker.
///
/// Keeps the first 70% of the budget and fills the rest from the tail.
/// Lengths are counted in characters and cuts always land on char boundaries.
pub fn compress_tool_output(content: &str, max_chars: usize) -> Cow<'_, str> {
    let total = content.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(content);
    }

    let keep_head = (max_chars as f64 * OUTPUT_HEAD_FRACTION) as usize;
    let keep_tail = max_chars - keep_head;
    let omitted = total - max_chars;

    let (head, _) = content.split_at(byte_offset(content, keep_head));
    let (_, tail) = content.split_at(byte_offset(content, total - keep_tail));
    Cow::Owned(format!("{head}\n... [{omitted} chars omitted] ...\n{tail}"))
}

/// Byte offset of the `char_index`-th character, or the end of the string.
fn byte_offset(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map_or(s.len(), |(offset, _)| offset)
}

/// Compress the parts of a message that are worth compressing.
///
/// Only tool-result blocks with string content are shortened (to
/// `config.tool_output_max_chars`). Plain-text messages, other block kinds,
/// and structured tool results pass through as-is.
pub fn compress_message(message: &Message, config: &ContextConfig) -> Message {
    let MessageContent::Blocks(blocks) = &message.content else {
        return message.clone();
    };

    let blocks = blocks
        .iter()
        .map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content: serde_json::Value::String(output),
                extra,
            } => ContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: serde_json::Value::String(
                    compress_tool_output(output, config.tool_output_max_chars).into_owned(),
                ),
                extra: extra.clone(),
            },
            other => other.clone(),
        })
        .collect();

    Message {
        role: message.role,
        content: MessageContent::Blocks(blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbered_lines(n: usize) -> String {
        (0..n)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_code_is_unchanged() {
        let code = numbered_lines(10);
        let out = compress_code_block(&code, 10);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, code.as_str());
    }

    #[test]
    fn long_code_keeps_head_and_tail() {
        let code = numbered_lines(100);
        let out = compress_code_block(&code, 10);

        assert!(out.contains("[90 lines omitted]"));
        assert!(out.starts_with("line 0\n"));
        assert!(out.contains("line 5\n"));
        assert!(!out.contains("line 6\n"));
        assert!(!out.contains("line 95"));
        assert!(out.contains("line 96"));
        assert!(out.ends_with("line 99"));

        // 10 kept lines, plus the marker line and its two blank separators.
        assert_eq!(out.split('\n').count(), 10 + 3);
    }

    #[test]
    fn zero_line_budget_leaves_only_marker() {
        let out = compress_code_block("a\nb\nc", 0);
        assert_eq!(out, "\n\n... [3 lines omitted] ...\n\n");
    }

    #[test]
    fn short_output_is_unchanged() {
        let out = compress_tool_output("ok", 2000);
        assert_eq!(out, "ok");
    }

    #[test]
    fn long_output_fits_budget_plus_marker() {
        let content = format!("{}{}", "h".repeat(2500), "t".repeat(2500));
        let out = compress_tool_output(&content, 2000);
        let marker = "\n... [3000 chars omitted] ...\n";

        assert!(out.contains(marker));
        assert_eq!(out.chars().count(), 2000 + marker.len());
        assert!(out.starts_with(&"h".repeat(1400)));
        assert!(out.ends_with(&"t".repeat(600)));
    }

    #[test]
    fn multibyte_output_cuts_on_char_boundaries() {
        let content = "é".repeat(3000);
        let out = compress_tool_output(&content, 100);
        let marker = "\n... [2900 chars omitted] ...\n";
        assert_eq!(out.chars().count(), 100 + marker.chars().count());
        assert!(out.starts_with(&"é".repeat(70)));
        assert!(out.ends_with(&"é".repeat(30)));
    }

    #[test]
    fn compress_message_only_touches_string_tool_results() {
        let config = ContextConfig::default().with_tool_output_max_chars(100);
        let long = "x".repeat(500);
        let structured = json!({"rows": ["x", "x", "x"]});
        let msg = Message::assistant(vec![
            ContentBlock::text(long.clone()),
            ContentBlock::tool_use("t1", "shell", json!({"cmd": "ls"})),
            ContentBlock::tool_result("t1", long.clone()),
            ContentBlock::tool_result("t2", structured.clone()),
        ]);

        let out = compress_message(&msg, &config);
        let MessageContent::Blocks(blocks) = out.content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks[0], ContentBlock::text(long.clone()));
        assert_eq!(blocks[1], ContentBlock::tool_use("t1", "shell", json!({"cmd": "ls"})));
        let ContentBlock::ToolResult { content, .. } = &blocks[2] else {
            panic!("expected tool result");
        };
        assert!(content.as_str().unwrap().contains("[400 chars omitted]"));
        assert_eq!(blocks[3], ContentBlock::tool_result("t2", structured));
    }

    #[test]
    fn compressed_tool_result_keeps_extra_fields() {
        let config = ContextConfig::default().with_tool_output_max_chars(10);
        let block: ContentBlock = serde_json::from_value(json!({
            "type": "tool_result",
            "tool_use_id": "t1",
            "content": "e".repeat(100),
            "is_error": true
        }))
        .unwrap();

        let out = compress_message(&Message::user(vec![block]), &config);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["content"][0]["is_error"], true);
        assert!(json["content"][0]["content"].as_str().unwrap().contains("[90 chars omitted]"));
    }

    #[test]
    fn compress_message_passes_plain_text_through() {
        let config = ContextConfig::default().with_tool_output_max_chars(10);
        let msg = Message::user("y".repeat(1000));
        assert_eq!(compress_message(&msg, &config), msg);
    }
}
