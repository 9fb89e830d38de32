//! Turns raw answer text into paragraphs and bullet lists.
//!
//! The text is never treated as markup: the only structure recognised is a
//! leading bullet marker (`-`, `*` or `•` followed by whitespace). Everything
//! else is kept as plain paragraph text.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    BulletList(Vec<String>),
    /// Vertical gap where the source had blank lines between content
    Spacer,
}

impl Block {
    /// Number of source lines this block stands for (spacers count as none).
    pub fn line_count(&self) -> usize {
        match self {
            Block::Paragraph(_) => 1,
            Block::BulletList(items) => items.len(),
            Block::Spacer => 0,
        }
    }
}

fn bullet_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-*•]\s+(.*)$").expect("bullet pattern is valid"))
}

/// Return the item text if `line` (already trimmed) starts with a bullet marker.
pub fn bullet_item(line: &str) -> Option<&str> {
    bullet_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parse `text` into display blocks. Total for every input; empty input gives no blocks.
pub fn render(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut bullets: Vec<String> = Vec::new();
    let mut gap = false;

    fn flush(blocks: &mut Vec<Block>, bullets: &mut Vec<String>) {
        if !bullets.is_empty() {
            blocks.push(Block::BulletList(std::mem::take(bullets)));
        }
    }

    for raw in text.lines() {
        let line = raw.trim();

        if line.is_empty() {
            flush(&mut blocks, &mut bullets);
            gap = !blocks.is_empty();
            continue;
        }

        if gap {
            blocks.push(Block::Spacer);
            gap = false;
        }

        match bullet_item(line) {
            Some(item) => bullets.push(item.to_string()),
            None => {
                flush(&mut blocks, &mut bullets);
                blocks.push(Block::Paragraph(line.to_string()));
            }
        }
    }

    flush(&mut blocks, &mut bullets);
    blocks
}

/// Serialize blocks back into normalized text (`- ` bullets, blank-line spacers).
pub fn to_text(blocks: &[Block]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for block in blocks {
        match block {
            Block::Paragraph(text) => lines.push(text.clone()),
            Block::BulletList(items) => lines.extend(items.iter().map(|i| format!("- {}", i))),
            Block::Spacer => lines.push(String::new()),
        }
    }
    lines.join("\n")
}
