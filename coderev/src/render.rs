//! Render review text to display blocks.
//!
//! The review returned by the provider is Markdown. Rather than matching
//! line prefixes by hand, this walks the pulldown-cmark event stream and
//! produces a flat list of display blocks. Inline markup (emphasis, strong,
//! links, inline code) is flattened to plain text; fenced code blocks keep
//! their contents and language tag.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// One displayable unit of a rendered review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem(String),
    CodeBlock { language: Option<String>, code: String },
}

/// Parse review text into display blocks.
pub fn render_blocks(input: &str) -> Vec<Block> {
    let parser = Parser::new_ext(input, Options::empty());

    let mut blocks = Vec::new();
    let mut text = String::new();
    let mut heading_level: Option<u8> = None;
    let mut code_language: Option<String> = None;
    let mut in_code_block = false;
    // List items may contain paragraphs; track depth so their boundaries
    // don't emit separate Paragraph blocks.
    let mut item_depth = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading_level = Some(level as u8);
                text.clear();
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(level) = heading_level.take() {
                    blocks.push(Block::Heading {
                        level,
                        text: std::mem::take(&mut text),
                    });
                }
            }
            Event::Start(Tag::Item) => {
                item_depth += 1;
                text.clear();
            }
            Event::End(TagEnd::Item) => {
                item_depth = item_depth.saturating_sub(1);
                let item = std::mem::take(&mut text);
                if !item.is_empty() {
                    blocks.push(Block::ListItem(item));
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                text.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                blocks.push(Block::CodeBlock {
                    language: code_language.take(),
                    code: std::mem::take(&mut text),
                });
            }
            Event::Start(Tag::Paragraph) => {
                if item_depth == 0 {
                    text.clear();
                } else if !text.is_empty() {
                    // Separate adjacent paragraphs inside one list item
                    text.push(' ');
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if item_depth == 0 {
                    let paragraph = std::mem::take(&mut text);
                    if !paragraph.is_empty() {
                        blocks.push(Block::Paragraph(paragraph));
                    }
                }
            }
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => {
                if in_code_block {
                    text.push('\n');
                } else {
                    text.push(' ');
                }
            }
            _ => {}
        }
    }

    blocks
}
