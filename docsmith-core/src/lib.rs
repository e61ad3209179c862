pub mod builder;
pub mod config;
pub mod frontmatter;
pub mod kernel;
pub mod markdown;
pub mod plugin;
pub mod plugins;
pub mod renderer;
pub mod router;
pub mod template;

// Re-export main types
pub use builder::{BuildError, BuildManifest, DocsBuilder, url_to_output_path};
pub use config::{DocsConfig, SiteConfig};
pub use frontmatter::{Frontmatter, FrontmatterValue, split_frontmatter};
pub use kernel::{ChangeKind, ErrorEvent, HookEvent, HookKind, KernelError, PluginKernel};
pub use plugin::{DocsPlugin, HookResult};
pub use renderer::{Adapter, PageContent, RenderError, Renderer};
pub use router::{ContentFile, Route, Router, path_to_url};
pub use template::HtmlAdapter;
