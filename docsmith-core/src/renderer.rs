use thiserror::Error;

use crate::config::{DocsConfig, SiteConfig};
use crate::frontmatter::Frontmatter;
use crate::markdown::TocEntry;
use crate::router::NavSection;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Adapter(String),
}

/// Everything the builder hands a renderer for one page: the processed
/// HTML plus the metadata a layout needs around it.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub frontmatter: Frontmatter,
    /// Body HTML after all `on_html_render` hooks have run.
    pub html: String,
    pub toc: Vec<TocEntry>,
    pub nav: Vec<NavSection>,
    pub site: SiteConfig,
}

/// The single call the builder makes into framework-specific code.
pub trait Renderer: Send + Sync {
    fn render(&self, page: &PageContent) -> Result<String, RenderError>;
}

/// Factory for renderers. Framework adapters (or the built-in vanilla
/// HTML one) implement this; the composing application picks one.
pub trait Adapter {
    fn create_renderer(&self, config: &DocsConfig) -> Result<Box<dyn Renderer>, RenderError>;
}
