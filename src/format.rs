//! Message formatter: an ordered-pass transformer from raw assistant text to
//! structured blocks. Fenced code is tokenized first, then inline spans
//! (backticks, then bold, then italic), then block structure (lists and
//! paragraphs). Passes run over tokens, never over produced markup, so text
//! captured by an earlier pass is invisible to later ones.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    Bold(String),
    Italic(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Code { lang: String, text: String },
    List { ordered: bool, items: Vec<Vec<Inline>> },
    Paragraph(Vec<Inline>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// Format raw text into render-safe markup. Pure; empty in, empty out.
pub fn format(raw: &str) -> String {
    parse(raw).to_markup()
}

/// Tokenize raw text into blocks. Fences are consumed before anything else;
/// an opening fence with no closing line stays literal.
pub fn parse(raw: &str) -> Document {
    let lines: Vec<&str> = raw.lines().collect();
    let mut blocks = Vec::new();
    let mut plain: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if let Some(tag) = lines[i].strip_prefix("```") {
            if let Some(end) = lines[i + 1..].iter().position(|l| l.trim_end() == "```") {
                flush_plain(&mut plain, &mut blocks);
                let lang = tag.trim();
                blocks.push(Block::Code {
                    lang: if lang.is_empty() { "plaintext".to_string() } else { lang.to_string() },
                    text: lines[i + 1..i + 1 + end].join("\n"),
                });
                i += end + 2;
                continue;
            }
        }
        plain.push(lines[i]);
        i += 1;
    }
    flush_plain(&mut plain, &mut blocks);

    Document { blocks }
}

/// Group the text lines between code fences into lists and paragraphs.
fn flush_plain(plain: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    let lines = std::mem::take(plain);
    let mut paragraph: Vec<&str> = Vec::new();
    let mut j = 0;

    while j < lines.len() {
        if let Some(first) = bullet_item(lines[j]) {
            flush_paragraph(&mut paragraph, blocks);
            let mut items = vec![parse_inline(first)];
            j += 1;
            while let Some(item) = lines.get(j).and_then(|l| bullet_item(l)) {
                items.push(parse_inline(item));
                j += 1;
            }
            blocks.push(Block::List { ordered: false, items });
            continue;
        }
        if let Some(first) = numbered_item(lines[j]) {
            flush_paragraph(&mut paragraph, blocks);
            let mut items = vec![parse_inline(first)];
            j += 1;
            while let Some(item) = lines.get(j).and_then(|l| numbered_item(l)) {
                items.push(parse_inline(item));
                j += 1;
            }
            blocks.push(Block::List { ordered: true, items });
            continue;
        }
        if lines[j].trim().is_empty() {
            flush_paragraph(&mut paragraph, blocks);
        } else {
            paragraph.push(lines[j]);
        }
        j += 1;
    }
    flush_paragraph(&mut paragraph, blocks);
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n");
    lines.clear();
    blocks.push(Block::Paragraph(parse_inline(&text)));
}

fn bullet_item(line: &str) -> Option<&str> {
    line.strip_prefix("* ")
}

fn numbered_item(line: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\d+\.\s+").unwrap());
    re.find(line).map(|m| &line[m.end()..])
}

/// Inline span pass: backtick code first, then `**bold**`, then `*italic*`.
/// Spans are innermost (closed by the nearest marker); unmatched or empty
/// markers stay literal.
fn parse_inline(text: &str) -> Vec<Inline> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '`' => match find_char(&chars, i + 1, '`') {
                Some(close) if close > i + 1 => {
                    push_text(&mut spans, &mut current);
                    spans.push(Inline::Code(chars[i + 1..close].iter().collect()));
                    i = close + 1;
                }
                _ => {
                    current.push('`');
                    i += 1;
                }
            },
            '*' if chars.get(i + 1) == Some(&'*') => match find_double_star(&chars, i + 2) {
                Some(close) if close > i + 2 => {
                    push_text(&mut spans, &mut current);
                    spans.push(Inline::Bold(chars[i + 2..close].iter().collect()));
                    i = close + 2;
                }
                _ => {
                    current.push_str("**");
                    i += 2;
                }
            },
            '*' => match find_char(&chars, i + 1, '*') {
                Some(close) if close > i + 1 => {
                    push_text(&mut spans, &mut current);
                    spans.push(Inline::Italic(chars[i + 1..close].iter().collect()));
                    i = close + 1;
                }
                _ => {
                    current.push('*');
                    i += 1;
                }
            },
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    push_text(&mut spans, &mut current);
    spans
}

fn push_text(spans: &mut Vec<Inline>, current: &mut String) {
    if !current.is_empty() {
        spans.push(Inline::Text(std::mem::take(current)));
    }
}

fn find_char(chars: &[char], from: usize, needle: char) -> Option<usize> {
    chars[from..].iter().position(|&c| c == needle).map(|p| from + p)
}

fn find_double_star(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1)).find(|&i| chars[i] == '*' && chars[i + 1] == '*')
}

/// Escape characters that are significant in markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl Document {
    /// Serialize to markup with all embedded text escaped.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::Code { lang, text } => {
                    out.push_str("<pre><code class=\"language-");
                    out.push_str(&escape(lang));
                    out.push_str("\">");
                    out.push_str(&escape(text));
                    out.push_str("</code></pre>");
                }
                Block::List { ordered, items } => {
                    out.push_str(if *ordered { "<ol>" } else { "<ul>" });
                    for item in items {
                        out.push_str("<li>");
                        for inline in item {
                            push_inline_markup(&mut out, inline);
                        }
                        out.push_str("</li>");
                    }
                    out.push_str(if *ordered { "</ol>" } else { "</ul>" });
                }
                Block::Paragraph(inlines) => {
                    out.push_str("<p>");
                    for inline in inlines {
                        push_inline_markup(&mut out, inline);
                    }
                    out.push_str("</p>");
                }
            }
        }
        out
    }
}

fn push_inline_markup(out: &mut String, inline: &Inline) {
    match inline {
        Inline::Text(t) => out.push_str(&escape(t)),
        Inline::Code(t) => {
            out.push_str("<code>");
            out.push_str(&escape(t));
            out.push_str("</code>");
        }
        Inline::Bold(t) => {
            out.push_str("<strong>");
            out.push_str(&escape(t));
            out.push_str("</strong>");
        }
        Inline::Italic(t) => {
            out.push_str("<em>");
            out.push_str(&escape(t));
            out.push_str("</em>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(format(""), "");
    }

    #[test]
    fn test_fence_becomes_one_code_block_with_language() {
        let out = format("```rust\nlet x = a < b;\n```");
        assert_eq!(out.matches("<pre>").count(), 1);
        assert!(out.contains("class=\"language-rust\""));
        assert!(out.contains("let x = a &lt; b;"));
    }

    #[test]
    fn test_fence_without_tag_defaults_to_plaintext() {
        let out = format("```\nplain\n```");
        assert!(out.contains("class=\"language-plaintext\""));
    }

    #[test]
    fn test_two_fences_yield_two_code_blocks() {
        let out = format("```\na\n```\ntext between\n```py\nb\n```");
        assert_eq!(out.matches("<pre>").count(), 2);
        assert!(out.contains("<p>text between</p>"));
    }

    #[test]
    fn test_unmatched_fence_stays_literal() {
        let out = format("```rust\nnever closed");
        assert!(!out.contains("<pre>"));
        assert!(out.contains("```rust"));
    }

    #[test]
    fn test_inline_code_is_escaped_and_wrapped() {
        let out = format("compare `x < 1` here");
        assert_eq!(out, "<p>compare <code>x &lt; 1</code> here</p>");
    }

    #[test]
    fn test_unmatched_backtick_stays_literal() {
        assert_eq!(format("a ` b"), "<p>a ` b</p>");
    }

    #[test]
    fn test_bold_matched_before_italic() {
        assert_eq!(format("**bold**"), "<p><strong>bold</strong></p>");
        assert_eq!(format("*italic*"), "<p><em>italic</em></p>");
        assert_eq!(
            format("**b** and *i*"),
            "<p><strong>b</strong> and <em>i</em></p>"
        );
    }

    #[test]
    fn test_unmatched_emphasis_stays_literal() {
        assert_eq!(format("2 * 3 = 6"), "<p>2 * 3 = 6</p>");
        assert_eq!(format("**open"), "<p>**open</p>");
    }

    #[test]
    fn test_emphasis_inside_code_is_untouched() {
        assert_eq!(format("`**not bold**`"), "<p><code>**not bold**</code></p>");
        let out = format("```\n**still literal**\n```");
        assert!(out.contains("**still literal**"));
        assert!(!out.contains("<strong>"));
    }

    #[test]
    fn test_bullet_lines_group_into_one_list() {
        let out = format("* one\n* two\n\nafter");
        assert_eq!(out, "<ul><li>one</li><li>two</li></ul><p>after</p>");
    }

    #[test]
    fn test_numbered_lines_group_into_ordered_list() {
        let out = format("1. first\n2. second");
        assert_eq!(out, "<ol><li>first</li><li>second</li></ol>");
    }

    #[test]
    fn test_list_items_carry_inline_formatting() {
        let out = format("* **bold** item");
        assert_eq!(out, "<ul><li><strong>bold</strong> item</li></ul>");
    }

    #[test]
    fn test_blank_lines_split_paragraphs() {
        let out = format("first\n\nsecond");
        assert_eq!(out, "<p>first</p><p>second</p>");
    }

    #[test]
    fn test_parse_structure_of_mixed_document() {
        let doc = parse("intro\n\n```sh\nls\n```\n* a\n* b");
        assert_eq!(doc.blocks.len(), 3);
        assert!(matches!(&doc.blocks[0], Block::Paragraph(_)));
        assert!(matches!(&doc.blocks[1], Block::Code { lang, .. } if lang == "sh"));
        assert!(matches!(&doc.blocks[2], Block::List { ordered: false, items } if items.len() == 2));
    }
}
