use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use walkdir::WalkDir;

use crate::config::DocsConfig;
use crate::frontmatter::FrontmatterValue;
use crate::kernel::{HookEvent, KernelError, PluginKernel};
use crate::markdown;
use crate::plugin::DocsPlugin;
use crate::renderer::{Adapter, PageContent, RenderError, Renderer};
use crate::router::{ContentFile, Route, Router, RouterError};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("router error: {0}")]
    Router(#[from] RouterError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl BuildError {
    fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| BuildError::Io { path, source }
    }
}

/// Record of one completed build, handed to `on_build_end` consumers
/// (sitemap, RSS, search indexes) and then dropped. Nothing in the core
/// persists it.
#[derive(Debug, Clone, Default)]
pub struct BuildManifest {
    pub pages: Vec<PageInfo>,
    pub assets: Vec<AssetInfo>,
    pub build_time: Duration,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    /// Output file, relative to the output root.
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AssetInfo {
    pub source: PathBuf,
    /// Copied location, relative to the output root.
    pub output_path: PathBuf,
}

/// Map a canonical URL onto its output file. `/` and every directory-style
/// URL get an `index.html`; extensionless paths get `.html`; explicit
/// `.html` paths pass through untouched.
pub fn url_to_output_path(url: &str) -> PathBuf {
    let trimmed = url.trim_start_matches('/');
    if trimmed.is_empty() {
        return PathBuf::from("index.html");
    }
    if url.ends_with('/') {
        return Path::new(trimmed).join("index.html");
    }
    if trimmed.ends_with(".html") {
        return PathBuf::from(trimmed);
    }
    PathBuf::from(format!("{trimmed}.html"))
}

/// Orchestrates one build pass: scan, plugin transforms, routing,
/// per-page render, asset copy, manifest. Owns the kernel and the router;
/// the renderer is injected through an [`Adapter`].
pub struct DocsBuilder {
    config: DocsConfig,
    kernel: PluginKernel,
    router: Router,
    renderer: Box<dyn Renderer>,
    config_applied: bool,
}

impl DocsBuilder {
    pub fn new(config: DocsConfig, adapter: &dyn Adapter) -> Result<Self, RenderError> {
        let renderer = adapter.create_renderer(&config)?;
        Ok(Self {
            config,
            kernel: PluginKernel::new(),
            router: Router::new(),
            renderer,
            config_applied: false,
        })
    }

    pub fn config(&self) -> &DocsConfig {
        &self.config
    }

    pub fn kernel(&self) -> &PluginKernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut PluginKernel {
        &mut self.kernel
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Register a plugin on the underlying kernel. Chainable.
    pub fn register(&mut self, plugin: DocsPlugin) -> Result<&mut Self, KernelError> {
        self.kernel.register(plugin)?;
        Ok(self)
    }

    /// Run one full build. Failures are surfaced twice, by design: once as
    /// an `Error` event so plugins observe them, and once as the returned
    /// `Err` for the caller. There is no partial manifest.
    pub fn build(&mut self) -> Result<BuildManifest, BuildError> {
        // Plugins get one shot at the resolved config, before the first build.
        if !self.config_applied {
            self.config_applied = true;
            let mut event = HookEvent::Config {
                config: self.config.clone(),
            };
            self.kernel.emit(&mut event);
            let HookEvent::Config { config } = event else {
                unreachable!("emit never changes the event variant")
            };
            self.config = config;
        }

        let started = Instant::now();
        let result = self.build_inner(started);
        self.kernel.run_with_error_boundary(move || result)
    }

    fn build_inner(&mut self, started: Instant) -> Result<BuildManifest, BuildError> {
        self.kernel.emit(&mut HookEvent::BuildStart);

        let out_dir = self.config.out_dir.clone();
        if out_dir.exists() {
            std::fs::remove_dir_all(&out_dir).map_err(BuildError::io(&out_dir))?;
        }
        std::fs::create_dir_all(&out_dir).map_err(BuildError::io(&out_dir))?;

        // Scan, then let plugins enrich or replace the file list.
        let files = Router::scan(&self.config.src_dir)?;
        let mut event = HookEvent::ContentLoad { files };
        self.kernel.emit(&mut event);
        let HookEvent::ContentLoad { files } = event else {
            unreachable!("emit never changes the event variant")
        };

        self.router.generate_routes(&files)?;

        let by_path: HashMap<&Path, &ContentFile> =
            files.iter().map(|f| (f.path.as_path(), f)).collect();
        let routes: Vec<Route> = self.router.routes().to_vec();
        let nav = self.router.hierarchy().to_vec();

        let mut pages = Vec::new();
        for route in &routes {
            let Some(file) = route
                .file_path
                .as_deref()
                .and_then(|p| by_path.get(p).copied())
            else {
                continue;
            };
            pages.push(self.build_page(route, file, &nav, &out_dir)?);
        }

        let assets = self.copy_assets(&out_dir)?;

        let manifest = BuildManifest {
            pages,
            assets,
            build_time: started.elapsed(),
        };
        let mut event = HookEvent::BuildEnd { manifest };
        self.kernel.emit(&mut event);
        let HookEvent::BuildEnd { manifest } = event else {
            unreachable!("emit never changes the event variant")
        };

        Ok(manifest)
    }

    fn build_page(
        &mut self,
        route: &Route,
        file: &ContentFile,
        nav: &[crate::router::NavSection],
        out_dir: &Path,
    ) -> Result<PageInfo, BuildError> {
        let ast = markdown::parse_markdown(&file.content);
        let mut event = HookEvent::MarkdownParse {
            url: route.path.clone(),
            ast,
        };
        self.kernel.emit(&mut event);
        let HookEvent::MarkdownParse { ast, .. } = event else {
            unreachable!("emit never changes the event variant")
        };

        let toc = markdown::extract_toc(&ast);
        let title = match route.frontmatter.get("title") {
            Some(FrontmatterValue::String(t)) if !t.is_empty() => t.clone(),
            _ => markdown::first_heading(&ast).unwrap_or_else(|| route.title()),
        };

        let html = markdown::render_html(&ast);
        let mut event = HookEvent::HtmlRender {
            url: route.path.clone(),
            html,
        };
        self.kernel.emit(&mut event);
        let HookEvent::HtmlRender { html, .. } = event else {
            unreachable!("emit never changes the event variant")
        };

        let page = PageContent {
            url: route.path.clone(),
            title: title.clone(),
            frontmatter: route.frontmatter.clone(),
            html,
            toc,
            nav: nav.to_vec(),
            site: self.config.site.clone(),
        };
        let rendered = self.renderer.render(&page)?;

        let relative = url_to_output_path(&route.path);
        let output_path = out_dir.join(&relative);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(BuildError::io(parent))?;
        }
        std::fs::write(&output_path, rendered).map_err(BuildError::io(&output_path))?;

        Ok(PageInfo {
            url: route.path.clone(),
            title,
            output_path: relative,
        })
    }

    fn copy_assets(&self, out_dir: &Path) -> Result<Vec<AssetInfo>, BuildError> {
        let assets_dir = self.config.src_dir.join("assets");
        let mut copied = Vec::new();
        if !assets_dir.exists() {
            return Ok(copied);
        }

        for entry in WalkDir::new(&assets_dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(&self.config.src_dir).unwrap_or(path);
            let dest = out_dir.join(relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(BuildError::io(parent))?;
            }
            std::fs::copy(path, &dest).map_err(BuildError::io(path))?;
            copied.push(AssetInfo {
                source: path.to_path_buf(),
                output_path: relative.to_path_buf(),
            });
        }

        Ok(copied)
    }
}
