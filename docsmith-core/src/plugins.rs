//! Built-in plugins. Each is a factory returning a fresh [`DocsPlugin`];
//! there are no shared pre-constructed instances.

use std::path::PathBuf;
use std::sync::LazyLock;

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::markdown::Block;
use crate::plugin::DocsPlugin;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

pub const DEFAULT_SYNTAX_THEME: &str = "base16-ocean.dark";

/// Fenced-code-block highlighting via syntect, as an `on_markdown_parse`
/// transform. Unknown languages and unknown themes degrade to the plain
/// `<pre><code>` rendering.
pub fn syntax_highlight(theme: impl Into<String>) -> DocsPlugin {
    let theme_name = theme.into();
    DocsPlugin::new("syntax-highlight")
        .version("0.1.0")
        .on_markdown_parse(move |_url, ast| {
            let theme = THEME_SET
                .themes
                .get(&theme_name)
                .or_else(|| THEME_SET.themes.get(DEFAULT_SYNTAX_THEME));
            if let Some(theme) = theme {
                highlight_blocks(&mut ast.blocks, theme);
            }
            Ok(())
        })
}

fn highlight_blocks(blocks: &mut [Block], theme: &Theme) {
    for block in blocks.iter_mut() {
        match block {
            Block::CodeBlock {
                language: Some(lang),
                code,
            } => {
                let Some(syntax) = SYNTAX_SET.find_syntax_by_token(lang) else {
                    continue;
                };
                if let Ok(html) = highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme) {
                    *block = Block::Html { content: html };
                }
            }
            Block::List { items, .. } => {
                for item in items {
                    highlight_blocks(item, theme);
                }
            }
            Block::BlockQuote { content } => highlight_blocks(content, theme),
            _ => {}
        }
    }
}

/// `on_build_end` consumer writing a `sitemap.xml` next to the built
/// pages. The canonical example of a manifest consumer.
pub fn sitemap(base_url: impl Into<String>, out_dir: impl Into<PathBuf>) -> DocsPlugin {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    let out_dir = out_dir.into();
    DocsPlugin::new("sitemap")
        .version("0.1.0")
        .on_build_end(move |manifest| {
            let mut xml = String::from(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
            );
            for page in &manifest.pages {
                xml.push_str(&format!(
                    "  <url><loc>{}{}</loc></url>\n",
                    base_url, page.url
                ));
            }
            xml.push_str("</urlset>\n");
            std::fs::write(out_dir.join("sitemap.xml"), xml)?;
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildManifest, PageInfo};
    use crate::kernel::{HookEvent, PluginKernel};
    use crate::markdown::parse_markdown;
    use std::time::Duration;

    #[test]
    fn highlighting_replaces_fenced_blocks() {
        let mut kernel = PluginKernel::new();
        kernel.register(syntax_highlight(DEFAULT_SYNTAX_THEME)).unwrap();

        let ast = parse_markdown("```rust\nfn main() {}\n```\n");
        let mut event = HookEvent::MarkdownParse {
            url: "/".into(),
            ast,
        };
        kernel.emit(&mut event);
        let HookEvent::MarkdownParse { ast, .. } = event else {
            panic!("event variant changed");
        };

        assert!(matches!(&ast.blocks[0], Block::Html { content } if content.contains("<pre")));
    }

    #[test]
    fn unknown_language_is_left_alone() {
        let mut kernel = PluginKernel::new();
        kernel.register(syntax_highlight(DEFAULT_SYNTAX_THEME)).unwrap();

        let ast = parse_markdown("```nosuchlanguage\nhello\n```\n");
        let mut event = HookEvent::MarkdownParse {
            url: "/".into(),
            ast,
        };
        kernel.emit(&mut event);
        let HookEvent::MarkdownParse { ast, .. } = event else {
            panic!("event variant changed");
        };

        assert!(matches!(&ast.blocks[0], Block::CodeBlock { .. }));
    }

    #[test]
    fn sitemap_lists_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut kernel = PluginKernel::new();
        kernel
            .register(sitemap("https://docs.example.com/", dir.path()))
            .unwrap();

        let manifest = BuildManifest {
            pages: vec![
                PageInfo {
                    url: "/".into(),
                    title: "Home".into(),
                    output_path: "index.html".into(),
                },
                PageInfo {
                    url: "/guide/".into(),
                    title: "Guide".into(),
                    output_path: "guide/index.html".into(),
                },
            ],
            assets: Vec::new(),
            build_time: Duration::from_millis(1),
        };
        kernel.emit(&mut HookEvent::BuildEnd { manifest });

        let xml = std::fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
        assert!(xml.contains("<loc>https://docs.example.com/</loc>"));
        assert!(xml.contains("<loc>https://docs.example.com/guide/</loc>"));
    }
}
