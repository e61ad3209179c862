use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Parsed document tree. This is the intermediate representation that
/// `on_markdown_parse` hooks transform before HTML emission, so every node
/// owns its text instead of borrowing from the source string.
#[derive(Debug, Clone, Default)]
pub struct DocAst {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone)]
pub enum Block {
    Heading { level: u32, content: Vec<Inline> },
    Paragraph { content: Vec<Inline> },
    CodeBlock { language: Option<String>, code: String },
    List { ordered: bool, items: Vec<Vec<Block>> },
    BlockQuote { content: Vec<Block> },
    Table { headers: Vec<Vec<Inline>>, rows: Vec<Vec<Vec<Inline>>> },
    Rule,
    Html { content: String },
}

#[derive(Debug, Clone)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { text: Vec<Inline>, url: String, title: Option<String> },
    Image { alt: String, url: String, title: Option<String> },
    Html(String),
    SoftBreak,
    HardBreak,
}

/// One table-of-contents entry, taken from the h2+ headings of a document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TocEntry {
    pub level: u32,
    pub text: String,
    pub slug: String,
}

pub fn parse_markdown(body: &str) -> DocAst {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut events = Parser::new_ext(body, options).peekable();
    DocAst {
        blocks: parse_blocks(&mut events, None),
    }
}

fn parse_blocks<'a, I>(events: &mut std::iter::Peekable<I>, until: Option<TagEnd>) -> Vec<Block>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut blocks = Vec::new();
    // Tight list items carry bare inline events with no paragraph wrapper;
    // they accumulate here and flush as one.
    let mut pending: Vec<Inline> = Vec::new();

    fn flush(pending: &mut Vec<Inline>, blocks: &mut Vec<Block>) {
        if !pending.is_empty() {
            blocks.push(Block::Paragraph {
                content: std::mem::take(pending),
            });
        }
    }

    while let Some(event) = events.next() {
        if let Some(inline) = parse_inline_event(&event, events) {
            pending.push(inline);
            continue;
        }
        flush(&mut pending, &mut blocks);
        match event {
            Event::End(end) if Some(end) == until => break,
            Event::Start(Tag::Heading { level, .. }) => {
                blocks.push(Block::Heading {
                    level: level as u32,
                    content: parse_inlines(events, TagEnd::Heading(level)),
                });
            }
            Event::Start(Tag::Paragraph) => {
                blocks.push(Block::Paragraph {
                    content: parse_inlines(events, TagEnd::Paragraph),
                });
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match &kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                let mut code = String::new();
                for inner in events.by_ref() {
                    match inner {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code.push_str(&text),
                        _ => {}
                    }
                }
                blocks.push(Block::CodeBlock { language, code });
            }
            Event::Start(Tag::List(start)) => {
                let ordered = start.is_some();
                let mut items = Vec::new();
                loop {
                    match events.next() {
                        Some(Event::Start(Tag::Item)) => {
                            items.push(parse_blocks(events, Some(TagEnd::Item)));
                        }
                        Some(Event::End(TagEnd::List(_))) | None => break,
                        _ => {}
                    }
                }
                blocks.push(Block::List { ordered, items });
            }
            Event::Start(Tag::BlockQuote(_)) => {
                blocks.push(Block::BlockQuote {
                    content: parse_blocks(events, Some(TagEnd::BlockQuote(None))),
                });
            }
            Event::Start(Tag::Table(_)) => {
                blocks.push(parse_table(events));
            }
            Event::Start(Tag::HtmlBlock) => {
                let mut content = String::new();
                for inner in events.by_ref() {
                    match inner {
                        Event::End(TagEnd::HtmlBlock) => break,
                        Event::Html(html) | Event::Text(html) => content.push_str(&html),
                        _ => {}
                    }
                }
                blocks.push(Block::Html { content });
            }
            Event::Rule => blocks.push(Block::Rule),
            Event::Html(html) => blocks.push(Block::Html {
                content: html.to_string(),
            }),
            _ => {}
        }
    }

    flush(&mut pending, &mut blocks);
    blocks
}

/// Consume one inline-level event, recursing into its children for span
/// tags. Returns `None` when the event is block-level (left untouched for
/// the caller to handle).
fn parse_inline_event<'a, I>(
    event: &Event<'a>,
    events: &mut std::iter::Peekable<I>,
) -> Option<Inline>
where
    I: Iterator<Item = Event<'a>>,
{
    match event {
        Event::Text(text) => Some(Inline::Text(text.to_string())),
        Event::Code(code) => Some(Inline::Code(code.to_string())),
        Event::InlineHtml(html) => Some(Inline::Html(html.to_string())),
        Event::SoftBreak => Some(Inline::SoftBreak),
        Event::HardBreak => Some(Inline::HardBreak),
        Event::Start(Tag::Emphasis) => {
            Some(Inline::Emphasis(parse_inlines(events, TagEnd::Emphasis)))
        }
        Event::Start(Tag::Strong) => Some(Inline::Strong(parse_inlines(events, TagEnd::Strong))),
        Event::Start(Tag::Strikethrough) => Some(Inline::Strikethrough(parse_inlines(
            events,
            TagEnd::Strikethrough,
        ))),
        Event::Start(Tag::Link { dest_url, title, .. }) => Some(Inline::Link {
            text: parse_inlines(events, TagEnd::Link),
            url: dest_url.to_string(),
            title: (!title.is_empty()).then(|| title.to_string()),
        }),
        Event::Start(Tag::Image { dest_url, title, .. }) => Some(Inline::Image {
            alt: inline_text(&parse_inlines(events, TagEnd::Image)),
            url: dest_url.to_string(),
            title: (!title.is_empty()).then(|| title.to_string()),
        }),
        _ => None,
    }
}

fn parse_table<'a, I>(events: &mut std::iter::Peekable<I>) -> Block
where
    I: Iterator<Item = Event<'a>>,
{
    let mut headers = Vec::new();
    let mut rows = Vec::new();
    let mut row: Vec<Vec<Inline>> = Vec::new();

    while let Some(event) = events.next() {
        match event {
            Event::End(TagEnd::TableHead) => {
                headers = std::mem::take(&mut row);
            }
            Event::Start(Tag::TableRow) => row.clear(),
            Event::End(TagEnd::TableRow) => rows.push(std::mem::take(&mut row)),
            Event::Start(Tag::TableCell) => {
                row.push(parse_inlines(events, TagEnd::TableCell));
            }
            Event::End(TagEnd::Table) => break,
            _ => {}
        }
    }

    Block::Table { headers, rows }
}

fn parse_inlines<'a, I>(events: &mut std::iter::Peekable<I>, until: TagEnd) -> Vec<Inline>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut inlines = Vec::new();

    while let Some(event) = events.next() {
        if let Event::End(end) = &event
            && *end == until
        {
            break;
        }
        if let Event::Html(html) = &event {
            inlines.push(Inline::Html(html.to_string()));
            continue;
        }
        if let Some(inline) = parse_inline_event(&event, events) {
            inlines.push(inline);
        }
    }

    inlines
}

/// Plain text of an inline run, for slugs, alt text and TOC labels.
pub fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Strikethrough(inner) => {
                out.push_str(&inline_text(inner));
            }
            Inline::Link { text, .. } => out.push_str(&inline_text(text)),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Html(_) => {}
        }
    }
    out
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Collect h2..h4 headings as the page table of contents. The single h1 is
/// the page title by convention and stays out.
pub fn extract_toc(ast: &DocAst) -> Vec<TocEntry> {
    ast.blocks
        .iter()
        .filter_map(|block| match block {
            Block::Heading { level, content } if (2..=4).contains(level) => {
                let text = inline_text(content);
                let slug = slugify(&text);
                Some(TocEntry {
                    level: *level,
                    text,
                    slug,
                })
            }
            _ => None,
        })
        .collect()
}

/// Text of the first h1, used as a title fallback when frontmatter has none.
pub fn first_heading(ast: &DocAst) -> Option<String> {
    ast.blocks.iter().find_map(|block| match block {
        Block::Heading { level: 1, content } => Some(inline_text(content)),
        _ => None,
    })
}

pub fn render_html(ast: &DocAst) -> String {
    let mut out = String::new();
    render_blocks(&ast.blocks, &mut out);
    out
}

fn render_blocks(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Heading { level, content } => {
                let slug = slugify(&inline_text(content));
                out.push_str(&format!("<h{level} id=\"{slug}\">"));
                render_inlines(content, out);
                out.push_str(&format!("</h{level}>\n"));
            }
            Block::Paragraph { content } => {
                out.push_str("<p>");
                render_inlines(content, out);
                out.push_str("</p>\n");
            }
            Block::CodeBlock { language, code } => {
                match language {
                    Some(lang) => out.push_str(&format!(
                        "<pre><code class=\"language-{}\">",
                        html_escape::encode_double_quoted_attribute(lang)
                    )),
                    None => out.push_str("<pre><code>"),
                }
                out.push_str(&html_escape::encode_text(code));
                out.push_str("</code></pre>\n");
            }
            Block::List { ordered, items } => {
                let tag = if *ordered { "ol" } else { "ul" };
                out.push_str(&format!("<{tag}>\n"));
                for item in items {
                    out.push_str("<li>");
                    render_blocks(item, out);
                    out.push_str("</li>\n");
                }
                out.push_str(&format!("</{tag}>\n"));
            }
            Block::BlockQuote { content } => {
                out.push_str("<blockquote>\n");
                render_blocks(content, out);
                out.push_str("</blockquote>\n");
            }
            Block::Table { headers, rows } => {
                out.push_str("<table>\n<thead><tr>");
                for cell in headers {
                    out.push_str("<th>");
                    render_inlines(cell, out);
                    out.push_str("</th>");
                }
                out.push_str("</tr></thead>\n<tbody>\n");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str("<td>");
                        render_inlines(cell, out);
                        out.push_str("</td>");
                    }
                    out.push_str("</tr>\n");
                }
                out.push_str("</tbody>\n</table>\n");
            }
            Block::Rule => out.push_str("<hr />\n"),
            Block::Html { content } => out.push_str(content),
        }
    }
}

fn render_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Inline::Code(code) => {
                out.push_str("<code>");
                out.push_str(&html_escape::encode_text(code));
                out.push_str("</code>");
            }
            Inline::Emphasis(inner) => {
                out.push_str("<em>");
                render_inlines(inner, out);
                out.push_str("</em>");
            }
            Inline::Strong(inner) => {
                out.push_str("<strong>");
                render_inlines(inner, out);
                out.push_str("</strong>");
            }
            Inline::Strikethrough(inner) => {
                out.push_str("<del>");
                render_inlines(inner, out);
                out.push_str("</del>");
            }
            Inline::Link { text, url, title } => {
                out.push_str(&format!(
                    "<a href=\"{}\"",
                    html_escape::encode_double_quoted_attribute(url)
                ));
                if let Some(title) = title {
                    out.push_str(&format!(
                        " title=\"{}\"",
                        html_escape::encode_double_quoted_attribute(title)
                    ));
                }
                out.push('>');
                render_inlines(text, out);
                out.push_str("</a>");
            }
            Inline::Image { alt, url, title } => {
                out.push_str(&format!(
                    "<img src=\"{}\" alt=\"{}\"",
                    html_escape::encode_double_quoted_attribute(url),
                    html_escape::encode_double_quoted_attribute(alt)
                ));
                if let Some(title) = title {
                    out.push_str(&format!(
                        " title=\"{}\"",
                        html_escape::encode_double_quoted_attribute(title)
                    ));
                }
                out.push_str(" />");
            }
            Inline::Html(html) => out.push_str(html),
            Inline::SoftBreak => out.push('\n'),
            Inline::HardBreak => out.push_str("<br />\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headings_and_paragraphs() {
        let ast = parse_markdown("# Title\n\nSome *emphasized* text.\n");
        assert_eq!(ast.blocks.len(), 2);
        assert!(matches!(ast.blocks[0], Block::Heading { level: 1, .. }));
        assert!(matches!(ast.blocks[1], Block::Paragraph { .. }));
    }

    #[test]
    fn renders_heading_with_slug_anchor() {
        let ast = parse_markdown("## Getting Started\n");
        let html = render_html(&ast);
        assert!(html.contains("<h2 id=\"getting-started\">Getting Started</h2>"));
    }

    #[test]
    fn fenced_code_keeps_language() {
        let ast = parse_markdown("```rust\nfn main() {}\n```\n");
        match &ast.blocks[0] {
            Block::CodeBlock { language, code } => {
                assert_eq!(language.as_deref(), Some("rust"));
                assert_eq!(code, "fn main() {}\n");
            }
            other => panic!("expected code block, got {other:?}"),
        }
        let html = render_html(&ast);
        assert!(html.contains("class=\"language-rust\""));
    }

    #[test]
    fn escapes_raw_text() {
        let ast = parse_markdown("a \\<b> c\n");
        let html = render_html(&ast);
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn nested_list_round_trips() {
        let ast = parse_markdown("- one\n- two\n  - two-a\n");
        match &ast.blocks[0] {
            Block::List { ordered, items } => {
                assert!(!ordered);
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn toc_skips_h1() {
        let ast = parse_markdown("# Page\n\n## First\n\n### Deep\n\n## Second\n");
        let toc = extract_toc(&ast);
        let slugs: Vec<&str> = toc.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["first", "deep", "second"]);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("v2.0 — What's New"), "v2-0-what-s-new");
    }

    #[test]
    fn first_heading_is_title_fallback() {
        let ast = parse_markdown("# The Title\n\ntext\n");
        assert_eq!(first_heading(&ast).as_deref(), Some("The Title"));
    }
}
