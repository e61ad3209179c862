use tera::{Context, Tera};

use crate::config::DocsConfig;
use crate::renderer::{Adapter, PageContent, RenderError, Renderer};

/// Layout used when no theme directory provides a `page.html`.
const DEFAULT_LAYOUT: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }} - {{ site.title }}</title>
</head>
<body>
<nav class="sidebar">
{% for section in nav %}<section>
{% if section.title %}<h3>{{ section.title }}</h3>{% endif %}
<ul>
{% for item in section.items %}<li><a href="{{ item.path }}">{{ item.title }}</a></li>
{% endfor %}</ul>
</section>
{% endfor %}</nav>
<main>
{{ page_content | safe }}
</main>
{% if toc %}<aside class="toc">
<ul>
{% for entry in toc %}<li class="toc-{{ entry.level }}"><a href="#{{ entry.slug }}">{{ entry.text }}</a></li>
{% endfor %}</ul>
</aside>
{% endif %}</body>
</html>
"##;

/// The vanilla adapter: renders pages through tera. A theme directory may
/// override the built-in layout by shipping its own `page.html`.
pub struct HtmlAdapter;

impl Adapter for HtmlAdapter {
    fn create_renderer(&self, config: &DocsConfig) -> Result<Box<dyn Renderer>, RenderError> {
        let mut tera = match &config.theme_dir {
            Some(dir) if dir.exists() => Tera::new(&format!("{}/**/*.html", dir.display()))?,
            _ => Tera::default(),
        };
        if !tera.get_template_names().any(|name| name == "page.html") {
            tera.add_raw_template("page.html", DEFAULT_LAYOUT)?;
        }

        Ok(Box::new(TeraRenderer { tera }))
    }
}

struct TeraRenderer {
    tera: Tera,
}

impl Renderer for TeraRenderer {
    fn render(&self, page: &PageContent) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("url", &page.url);
        context.insert("title", &page.title);
        context.insert("site", &page.site);
        context.insert("frontmatter", &page.frontmatter);
        context.insert("page_content", &page.html);
        context.insert("toc", &page.toc);
        context.insert("nav", &page.nav);

        Ok(self.tera.render("page.html", &context)?)
    }
}
