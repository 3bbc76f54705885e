//! Study guide renderer.
//!
//! Turns the generator's markdown-like text into a self-contained HTML
//! document. Only the constructs study guides actually use are recognised:
//! headings, bullet and numbered lists, pipe tables, paragraphs and inline
//! bold/italic/code.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;

use remedia_core::message::escape_html;
use remedia_core::traits::{RenderedDocument, Renderer};

/// Body used when the generated content is empty or only whitespace.
pub const PLACEHOLDER_TEXT: &str = "Content could not be generated. Please try again.";

/// A parsed block of guide content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: usize, text: String },
    Paragraph(String),
    Bullet(String),
    Numbered(String),
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Blank,
}

impl Block {
    fn has_text(&self) -> bool {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph(text)
            | Block::Bullet(text)
            | Block::Numbered(text) => !text.trim().is_empty(),
            Block::Table { header, rows } => !header.is_empty() || !rows.is_empty(),
            Block::Blank => false,
        }
    }
}

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("valid heading regex"))
}

fn numbered_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s+(.*)$").expect("valid numbered regex"))
}

fn divider_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:?-{3,}:?$").expect("valid divider regex"))
}

fn is_table_line(line: &str) -> bool {
    line.starts_with('|') && line[1..].contains('|')
}

/// Split markdown-like text into blocks. Runs of blank lines collapse to one.
pub fn parse_blocks(content: &str) -> Vec<Block> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut blocks = Vec::new();
    let mut table: Vec<&str> = Vec::new();

    for line in content.lines() {
        let stripped = line.trim();

        if !table.is_empty() && !is_table_line(stripped) {
            blocks.push(table_block(&table));
            table.clear();
        }

        if stripped.is_empty() {
            if blocks.last() != Some(&Block::Blank) {
                blocks.push(Block::Blank);
            }
            continue;
        }
        if is_table_line(stripped) {
            table.push(stripped);
            continue;
        }
        if let Some(caps) = heading_pattern().captures(stripped) {
            blocks.push(Block::Heading {
                level: caps[1].len(),
                text: caps[2].trim().to_string(),
            });
            continue;
        }
        if let Some(text) = stripped
            .strip_prefix("- ")
            .or_else(|| stripped.strip_prefix("* "))
        {
            blocks.push(Block::Bullet(text.trim().to_string()));
            continue;
        }
        if let Some(caps) = numbered_pattern().captures(stripped) {
            blocks.push(Block::Numbered(caps[1].trim().to_string()));
            continue;
        }
        blocks.push(Block::Paragraph(stripped.to_string()));
    }
    if !table.is_empty() {
        blocks.push(table_block(&table));
    }
    blocks
}

/// A pipe table; the first row is a header only when followed by a divider.
fn table_block(lines: &[&str]) -> Block {
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|line| {
            line.trim()
                .trim_matches('|')
                .split('|')
                .map(|cell| cell.trim().to_string())
                .collect()
        })
        .collect();

    let has_divider = rows.len() >= 2
        && rows[1]
            .iter()
            .all(|cell| divider_pattern().is_match(&cell.replace(' ', "")));
    if has_divider {
        let mut iter = rows.into_iter();
        let header = iter.next().unwrap_or_default();
        Block::Table {
            header,
            rows: iter.skip(1).collect(),
        }
    } else {
        Block::Table {
            header: Vec::new(),
            rows,
        }
    }
}

fn bold_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"))
}

fn italic_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("valid italic regex"))
}

fn code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("valid code regex"))
}

/// Escape, then apply inline emphasis.
fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let coded = code_pattern().replace_all(&escaped, "<code>$1</code>");
    let bold = bold_pattern().replace_all(&coded, "<strong>$1</strong>");
    italic_pattern()
        .replace_all(&bold, "<em>$1</em>")
        .into_owned()
}

fn render_blocks(blocks: &[Block]) -> String {
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for block in blocks {
        let wanted = match block {
            Block::Bullet(_) => Some("ul"),
            Block::Numbered(_) => Some("ol"),
            _ => None,
        };
        if open_list != wanted {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{tag}>\n"));
            }
            if let Some(tag) = wanted {
                html.push_str(&format!("<{tag}>\n"));
            }
            open_list = wanted;
        }

        match block {
            Block::Heading { level, text } => {
                // h1 is reserved for the document title.
                let level = (*level + 1).min(6);
                html.push_str(&format!("<h{level}>{}</h{level}>\n", inline(text)));
            }
            Block::Paragraph(text) => html.push_str(&format!("<p>{}</p>\n", inline(text))),
            Block::Bullet(text) | Block::Numbered(text) => {
                html.push_str(&format!("<li>{}</li>\n", inline(text)))
            }
            Block::Table { header, rows } => {
                html.push_str("<table>\n");
                if !header.is_empty() {
                    html.push_str("<thead><tr>");
                    for cell in header {
                        html.push_str(&format!("<th>{}</th>", inline(cell)));
                    }
                    html.push_str("</tr></thead>\n");
                }
                html.push_str("<tbody>\n");
                for row in rows {
                    html.push_str("<tr>");
                    for cell in row {
                        html.push_str(&format!("<td>{}</td>", inline(cell)));
                    }
                    html.push_str("</tr>\n");
                }
                html.push_str("</tbody></table>\n");
            }
            Block::Blank => {}
        }
    }
    if let Some(tag) = open_list {
        html.push_str(&format!("</{tag}>\n"));
    }
    html
}

/// Build the full HTML document for a guide.
pub fn render_guide_html(content: &str, title: &str, generated_on: NaiveDate) -> String {
    let mut blocks = parse_blocks(content);
    if !blocks.iter().any(Block::has_text) {
        tracing::warn!(title, "empty study guide content, rendering placeholder");
        blocks = vec![Block::Paragraph(PLACEHOLDER_TEXT.to_string())];
    }
    let title = if title.trim().is_empty() {
        "Generated Document"
    } else {
        title
    };
    let title = escape_html(title);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{title}</title>\n"));
    html.push_str("<style>\n");
    html.push_str(GUIDE_CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str("<section class=\"title-header\">\n");
    html.push_str(&format!("<h1>{title}</h1>\n"));
    html.push_str(&format!(
        "<p class=\"subtitle\">Generated on {}</p>\n",
        generated_on.format("%d %B %Y")
    ));
    html.push_str("</section>\n<article class=\"content\">\n");
    html.push_str(&render_blocks(&blocks));
    html.push_str("</article>\n</body>\n</html>");
    html
}

/// [`Renderer`] producing `text/html` study guides.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    /// Fixed date for the "Generated on" line; today when unset.
    date: Option<NaiveDate>,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    fn name(&self) -> &str {
        "html"
    }

    async fn render_document(&self, content: &str, title: &str) -> anyhow::Result<RenderedDocument> {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let html = render_guide_html(content, title, date);
        Ok(RenderedDocument {
            bytes: html.into_bytes(),
            content_type: "text/html; charset=utf-8".to_string(),
            extension: "html".to_string(),
        })
    }
}

const GUIDE_CSS: &str = r#"
body { font-family: 'Noto Sans', 'Segoe UI', sans-serif; margin: 0 auto; max-width: 46rem; padding: 2rem; color: #1f2933; line-height: 1.55; }
.title-header { border-bottom: 3px solid #2c3e50; margin-bottom: 1.5rem; }
.title-header h1 { color: #2c3e50; margin-bottom: 0.25rem; }
.subtitle { color: #6b7280; margin-top: 0; }
h2, h3, h4 { color: #2c3e50; margin-top: 1.5rem; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid #d1d5db; padding: 0.4rem 0.8rem; text-align: left; }
th { background: #f3f4f6; }
code { font-family: 'JetBrains Mono', monospace; background: #f3f4f6; padding: 0 0.2rem; }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()
    }

    #[test]
    fn parses_common_blocks() {
        let blocks = parse_blocks("# Hotels\n\n\n- one\n* two\n1. first\n2) second\nPlain text");
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Hotels".into()
                },
                Block::Blank,
                Block::Bullet("one".into()),
                Block::Bullet("two".into()),
                Block::Numbered("first".into()),
                Block::Numbered("second".into()),
                Block::Paragraph("Plain text".into()),
            ]
        );
    }

    #[test]
    fn table_with_divider_has_header() {
        let blocks = parse_blocks("| Term | Meaning |\n|---|:---:|\n| Sarai | Inn |\nAfter");
        assert_eq!(
            blocks[0],
            Block::Table {
                header: vec!["Term".into(), "Meaning".into()],
                rows: vec![vec!["Sarai".into(), "Inn".into()]],
            }
        );
        assert_eq!(blocks[1], Block::Paragraph("After".into()));
    }

    #[test]
    fn table_without_divider_is_all_rows() {
        let blocks = parse_blocks("| a | b |\n| c | d |");
        assert!(matches!(&blocks[0], Block::Table { header, rows } if header.is_empty() && rows.len() == 2));
    }

    #[test]
    fn empty_content_renders_placeholder() {
        let html = render_guide_html("  \n\n ", "Guide", date());
        assert!(html.contains(PLACEHOLDER_TEXT));
        assert!(html.contains("Generated on 03 May 2024"));
    }

    #[test]
    fn content_is_escaped_and_formatted() {
        let html = render_guide_html(
            "## Tip\nUse **bold** and `code` <script>x</script>\n- item *one*",
            "Guide for <a@x.com>",
            date(),
        );
        assert!(html.contains("<title>Guide for &lt;a@x.com&gt;</title>"));
        assert!(html.contains("<h3>Tip</h3>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<code>code</code>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<ul>\n<li>item <em>one</em></li>\n</ul>"));
    }

    #[test]
    fn blank_title_gets_default() {
        let html = render_guide_html("text", " ", date());
        assert!(html.contains("<h1>Generated Document</h1>"));
    }

    #[tokio::test]
    async fn renderer_produces_html_document() {
        let renderer = HtmlRenderer::new().with_date(date());
        let doc = renderer
            .render_document("# Study Guide", "Personalized Study Guide - a@x.com")
            .await
            .unwrap();
        assert_eq!(doc.extension, "html");
        assert!(doc.content_type.starts_with("text/html"));
        let html = String::from_utf8(doc.bytes).unwrap();
        assert!(html.contains("Personalized Study Guide - a@x.com"));
    }
}
