//! Heuristic token estimation.
//!
//! A fast character-ratio estimator, not a tokenizer. Prose averages about
//! 3.5 characters per token, source code packs tighter, and CJK text tighter
//! still. Structural punctuation and newlines tend to become their own tokens,
//! so each adds a small fixed bonus.

use crate::{ContentBlock, Message, MessageContent, value_text};

/// Characters per token for ordinary prose.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Characters per token for text that looks like source code.
const CODE_CHARS_PER_TOKEN: f64 = 3.0;

/// Characters per token for text containing CJK or kana characters.
const CJK_CHARS_PER_TOKEN: f64 = 2.0;

/// Fixed per-message cost for role and framing.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 10;

/// Flat charge for an image block regardless of its size.
pub const IMAGE_TOKENS: usize = 1000;

const PUNCTUATION_BONUS: f64 = 0.1;
const NEWLINE_BONUS: f64 = 0.5;

const STRUCTURAL_CHARS: &str = "{}[]().,;:!?<>";

const CODE_MARKERS: [&str; 7] = [
    "function ", "class ", "const ", "let ", "var ", "import ", "export ",
];

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c) || ('\u{3040}'..='\u{30ff}').contains(&c)
}

fn looks_like_code(text: &str) -> bool {
    text.trim_start().starts_with("```") || CODE_MARKERS.iter().any(|m| text.contains(m))
}

/// Estimate the token count of a piece of text.
///
/// Deterministic and linear in the length of `text`. Returns 0 for an empty
/// string; any non-empty string costs at least one token.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut chars = 0usize;
    let mut structural = 0usize;
    let mut newlines = 0usize;
    let mut has_cjk = false;
    for c in text.chars() {
        chars += 1;
        if c == '\n' {
            newlines += 1;
        } else if STRUCTURAL_CHARS.contains(c) {
            structural += 1;
        }
        has_cjk |= is_cjk(c);
    }

    let chars_per_token = if has_cjk {
        CJK_CHARS_PER_TOKEN
    } else if looks_like_code(text) {
        CODE_CHARS_PER_TOKEN
    } else {
        DEFAULT_CHARS_PER_TOKEN
    };

    let mut tokens = chars as f64 / chars_per_token;
    tokens += structural as f64 * PUNCTUATION_BONUS;
    tokens += newlines as f64 * NEWLINE_BONUS;
    tokens.ceil() as usize
}

/// Estimate the tokens a single block contributes beyond message overhead.
pub fn estimate_block_tokens(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text { text, .. } => estimate_tokens(text),
        ContentBlock::ToolUse { name, input, .. } => {
            estimate_tokens(name) + estimate_tokens(&input.to_string())
        }
        ContentBlock::ToolResult { content, .. } => estimate_tokens(&value_text(content)),
        ContentBlock::Image { .. } => IMAGE_TOKENS,
        ContentBlock::Unknown(_) => 0,
    }
}

/// Estimate the tokens of one message, including the fixed framing overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let body = match &message.content {
        MessageContent::Text(text) => estimate_tokens(text),
        MessageContent::Blocks(blocks) => blocks.iter().map(estimate_block_tokens).sum(),
    };
    MESSAGE_OVERHEAD_TOKENS + body
}

/// Estimate the tokens of a whole message sequence.
pub fn estimate_total_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn prose_uses_default_ratio() {
        // 5 chars / 3.5 = 1.43, rounded up.
        assert_eq!(estimate_tokens("hello"), 2);
        // 11 chars / 3.5 = 3.14, rounded up.
        assert_eq!(estimate_tokens("hello world"), 4);
    }

    #[test]
    fn code_uses_tighter_ratio() {
        // 12 chars / 3.0 = 4.0, plus 0.1 for ';'.
        assert_eq!(estimate_tokens("const x = 1;"), 5);
        assert!(looks_like_code("```rust\nfn main() {}\n```"));
        assert!(!looks_like_code("a constant reminder"));
    }

    #[test]
    fn cjk_uses_tightest_ratio() {
        assert_eq!(estimate_tokens("你好"), 1);
        assert_eq!(estimate_tokens("こんにちは世界"), 4);
    }

    #[test]
    fn newlines_and_punctuation_add_bonus() {
        // 3 chars / 3.5 = 0.86, plus 0.5 for the newline.
        assert_eq!(estimate_tokens("a\nb"), 2);
        // 10 chars / 3.5 = 2.86; the dotted run adds 10 * 0.1 on top.
        assert_eq!(estimate_tokens(&"a".repeat(10)), 3);
        assert_eq!(estimate_tokens(&".".repeat(10)), 4);
    }

    #[test]
    fn estimate_is_deterministic() {
        let text = "Some {structured} text; with (lots) of punctuation!\nAnd lines.";
        assert_eq!(estimate_tokens(text), estimate_tokens(text));
    }

    #[test]
    fn message_overhead_applies_to_every_message() {
        assert_eq!(estimate_message_tokens(&Message::user("")), MESSAGE_OVERHEAD_TOKENS);
        assert_eq!(
            estimate_message_tokens(&Message::user("hello")),
            MESSAGE_OVERHEAD_TOKENS + 2
        );
        assert_eq!(
            estimate_message_tokens(&Message::assistant(Vec::<ContentBlock>::new())),
            MESSAGE_OVERHEAD_TOKENS
        );
    }

    #[test]
    fn block_costs_by_kind() {
        let msg = Message::assistant(vec![
            ContentBlock::text("hello"),
            ContentBlock::image(json!({"type": "base64", "data": "AAAA"})),
            ContentBlock::Unknown(json!({"type": "thinking", "thinking": "long plan"})),
        ]);
        assert_eq!(estimate_message_tokens(&msg), 10 + 2 + IMAGE_TOKENS);

        let tool_use = ContentBlock::tool_use("t1", "grep", json!({"q": "x"}));
        let expected = estimate_tokens("grep") + estimate_tokens(r#"{"q":"x"}"#);
        assert_eq!(estimate_block_tokens(&tool_use), expected);

        let tool_result = ContentBlock::tool_result("t1", "hello world");
        assert_eq!(estimate_block_tokens(&tool_result), 4);
    }

    #[test]
    fn non_string_tool_result_is_stringified() {
        let content = json!([{"type": "text", "text": "nested"}]);
        let rendered = content.to_string();
        let block = ContentBlock::tool_result("t1", content);
        assert_eq!(estimate_block_tokens(&block), estimate_tokens(&rendered));
    }

    #[test]
    fn total_sums_messages() {
        let messages = vec![Message::user("hello"), Message::assistant("hello world")];
        assert_eq!(estimate_total_tokens(&messages), 12 + 14);
        assert_eq!(estimate_total_tokens(&[]), 0);
    }
}
