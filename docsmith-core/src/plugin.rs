use std::fmt;
use std::path::Path;

use crate::builder::BuildManifest;
use crate::config::DocsConfig;
use crate::kernel::{ChangeKind, ErrorEvent, HookKind};
use crate::markdown::DocAst;
use crate::router::ContentFile;

/// What a hook returns. Hooks fail with whatever error type suits them;
/// the kernel wraps it into a `PluginError` before reporting.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub type ConfigHook = Box<dyn Fn(&mut DocsConfig) -> HookResult + Send + Sync>;
pub type ContentLoadHook = Box<dyn Fn(&mut Vec<ContentFile>) -> HookResult + Send + Sync>;
pub type MarkdownParseHook = Box<dyn Fn(&str, &mut DocAst) -> HookResult + Send + Sync>;
pub type HtmlRenderHook = Box<dyn Fn(&str, &mut String) -> HookResult + Send + Sync>;
pub type BuildStartHook = Box<dyn Fn() -> HookResult + Send + Sync>;
pub type BuildEndHook = Box<dyn Fn(&BuildManifest) -> HookResult + Send + Sync>;
pub type DevServerHook = Box<dyn Fn(&str) -> HookResult + Send + Sync>;
pub type FileChangeHook = Box<dyn Fn(&Path, ChangeKind) -> HookResult + Send + Sync>;
pub type DestroyHook = Box<dyn Fn() -> HookResult + Send + Sync>;
pub type ErrorHook = Box<dyn Fn(&ErrorEvent) -> HookResult + Send + Sync>;

/// A plugin: a name plus any subset of the lifecycle hooks. Every hook is
/// independently optional; a plugin with none is valid, just inert.
///
/// Plugins are built through chained setters and handed to
/// [`PluginKernel::register`](crate::kernel::PluginKernel::register):
///
/// ```
/// use docsmith_core::DocsPlugin;
///
/// let plugin = DocsPlugin::new("shout")
///     .version("1.0.0")
///     .on_html_render(|_url, html| {
///         html.push_str("<!-- rendered by shout -->");
///         Ok(())
///     });
/// assert_eq!(plugin.name, "shout");
/// ```
#[derive(Default)]
pub struct DocsPlugin {
    /// Unique identity within one kernel.
    pub name: String,
    /// Informational only.
    pub version: String,
    /// Declarative hint, not enforced by the kernel.
    pub dependencies: Vec<String>,
    pub on_config: Option<ConfigHook>,
    pub on_content_load: Option<ContentLoadHook>,
    pub on_markdown_parse: Option<MarkdownParseHook>,
    pub on_html_render: Option<HtmlRenderHook>,
    pub on_build_start: Option<BuildStartHook>,
    pub on_build_end: Option<BuildEndHook>,
    pub on_dev_server: Option<DevServerHook>,
    pub on_file_change: Option<FileChangeHook>,
    pub on_destroy: Option<DestroyHook>,
    pub on_error: Option<ErrorHook>,
}

impl DocsPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn on_config(
        mut self,
        hook: impl Fn(&mut DocsConfig) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_config = Some(Box::new(hook));
        self
    }

    pub fn on_content_load(
        mut self,
        hook: impl Fn(&mut Vec<ContentFile>) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_content_load = Some(Box::new(hook));
        self
    }

    pub fn on_markdown_parse(
        mut self,
        hook: impl Fn(&str, &mut DocAst) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_markdown_parse = Some(Box::new(hook));
        self
    }

    pub fn on_html_render(
        mut self,
        hook: impl Fn(&str, &mut String) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_html_render = Some(Box::new(hook));
        self
    }

    pub fn on_build_start(mut self, hook: impl Fn() -> HookResult + Send + Sync + 'static) -> Self {
        self.on_build_start = Some(Box::new(hook));
        self
    }

    pub fn on_build_end(
        mut self,
        hook: impl Fn(&BuildManifest) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_build_end = Some(Box::new(hook));
        self
    }

    pub fn on_dev_server(
        mut self,
        hook: impl Fn(&str) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_dev_server = Some(Box::new(hook));
        self
    }

    pub fn on_file_change(
        mut self,
        hook: impl Fn(&Path, ChangeKind) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_file_change = Some(Box::new(hook));
        self
    }

    pub fn on_destroy(mut self, hook: impl Fn() -> HookResult + Send + Sync + 'static) -> Self {
        self.on_destroy = Some(Box::new(hook));
        self
    }

    pub fn on_error(
        mut self,
        hook: impl Fn(&ErrorEvent) -> HookResult + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// The hook kinds this plugin implements.
    pub fn hooks(&self) -> Vec<HookKind> {
        let mut kinds = Vec::new();
        let mut push = |present: bool, kind: HookKind| {
            if present {
                kinds.push(kind);
            }
        };
        push(self.on_config.is_some(), HookKind::Config);
        push(self.on_content_load.is_some(), HookKind::ContentLoad);
        push(self.on_markdown_parse.is_some(), HookKind::MarkdownParse);
        push(self.on_html_render.is_some(), HookKind::HtmlRender);
        push(self.on_build_start.is_some(), HookKind::BuildStart);
        push(self.on_build_end.is_some(), HookKind::BuildEnd);
        push(self.on_dev_server.is_some(), HookKind::DevServer);
        push(self.on_file_change.is_some(), HookKind::FileChange);
        push(self.on_destroy.is_some(), HookKind::Destroy);
        push(self.on_error.is_some(), HookKind::Error);
        kinds
    }
}

impl fmt::Debug for DocsPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocsPlugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("dependencies", &self.dependencies)
            .field("hooks", &self.hooks())
            .finish()
    }
}
