use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::builder::BuildManifest;
use crate::config::DocsConfig;
use crate::markdown::DocAst;
use crate::plugin::DocsPlugin;
use crate::router::ContentFile;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("a plugin named '{0}' is already registered")]
    DuplicatePlugin(String),
    #[error("the kernel has been destroyed")]
    Destroyed,
}

/// A hook failing inside dispatch. Carries enough to tell which plugin
/// broke without losing the underlying error.
#[derive(Debug, Error)]
#[error("plugin '{plugin}' failed in {hook:?} hook: {source}")]
pub struct PluginError {
    pub plugin: String,
    pub hook: HookKind,
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Payload of an `Error` event. Built from a `PluginError` for hook
/// failures, or bare for errors crossing the kernel's error boundary.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub plugin: Option<String>,
    pub hook: Option<HookKind>,
    pub message: String,
}

impl From<PluginError> for ErrorEvent {
    fn from(err: PluginError) -> Self {
        let message = err.to_string();
        Self {
            plugin: Some(err.plugin),
            hook: Some(err.hook),
            message,
        }
    }
}

impl ErrorEvent {
    pub fn boundary(message: impl Into<String>) -> Self {
        Self {
            plugin: None,
            hook: None,
            message: message.into(),
        }
    }
}

/// Normalized filesystem change kind handed to `on_file_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// The closed set of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Config,
    ContentLoad,
    MarkdownParse,
    HtmlRender,
    BuildStart,
    BuildEnd,
    DevServer,
    FileChange,
    Destroy,
    Error,
}

/// A lifecycle event with its typed payload. Transform events carry their
/// payload by value; listeners mutate it in place and the emitter takes it
/// back out afterwards.
#[derive(Debug)]
pub enum HookEvent {
    Config { config: DocsConfig },
    ContentLoad { files: Vec<ContentFile> },
    MarkdownParse { url: String, ast: DocAst },
    HtmlRender { url: String, html: String },
    BuildStart,
    BuildEnd { manifest: BuildManifest },
    DevServer { address: String },
    FileChange { path: PathBuf, kind: ChangeKind },
    Destroy,
    Error { error: ErrorEvent },
}

impl HookEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::Config { .. } => HookKind::Config,
            HookEvent::ContentLoad { .. } => HookKind::ContentLoad,
            HookEvent::MarkdownParse { .. } => HookKind::MarkdownParse,
            HookEvent::HtmlRender { .. } => HookKind::HtmlRender,
            HookEvent::BuildStart => HookKind::BuildStart,
            HookEvent::BuildEnd { .. } => HookKind::BuildEnd,
            HookEvent::DevServer { .. } => HookKind::DevServer,
            HookEvent::FileChange { .. } => HookKind::FileChange,
            HookEvent::Destroy => HookKind::Destroy,
            HookEvent::Error { .. } => HookKind::Error,
        }
    }
}

/// Token for unsubscribing a listener. Closures have no identity in Rust,
/// so removal is by token rather than by callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type ListenerFn = Box<dyn FnMut(&mut HookEvent) -> Result<(), PluginError> + Send>;

struct Listener {
    id: ListenerId,
    callback: ListenerFn,
}

/// The plugin micro-kernel: an ordered plugin registry plus per-event
/// listener lists. Registering a plugin wires each of its hooks in as a
/// listener, so dispatch order is registration order, interleaved with any
/// ad-hoc listeners in subscription order.
///
/// The kernel is `Active` until [`destroy`](Self::destroy) flips it to its
/// terminal state; a destroyed kernel accepts nothing and dispatches
/// nothing.
pub struct PluginKernel {
    plugins: HashMap<String, Arc<DocsPlugin>>,
    order: Vec<String>,
    listeners: HashMap<HookKind, Vec<Listener>>,
    next_listener_id: u64,
    destroyed: bool,
}

impl std::fmt::Debug for PluginKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginKernel")
            .field("order", &self.order)
            .field("next_listener_id", &self.next_listener_id)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl Default for PluginKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginKernel {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            order: Vec::new(),
            listeners: HashMap::new(),
            next_listener_id: 0,
            destroyed: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Add a plugin. Fails on a duplicate name or a destroyed kernel.
    /// Returns `&mut Self` for chaining.
    pub fn register(&mut self, plugin: DocsPlugin) -> Result<&mut Self, KernelError> {
        if self.destroyed {
            return Err(KernelError::Destroyed);
        }
        if self.plugins.contains_key(&plugin.name) {
            return Err(KernelError::DuplicatePlugin(plugin.name));
        }

        let plugin = Arc::new(plugin);
        self.wire_hooks(&plugin);
        self.order.push(plugin.name.clone());
        self.plugins.insert(plugin.name.clone(), plugin);
        Ok(self)
    }

    /// Registered plugins in registration order.
    pub fn list_plugins(&self) -> Vec<&DocsPlugin> {
        self.order
            .iter()
            .filter_map(|name| self.plugins.get(name).map(Arc::as_ref))
            .collect()
    }

    /// Subscribe a listener for one event kind. No-op (the returned id is
    /// dead) once the kernel is destroyed.
    pub fn on(
        &mut self,
        kind: HookKind,
        callback: impl FnMut(&mut HookEvent) -> Result<(), PluginError> + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        if !self.destroyed {
            self.listeners.entry(kind).or_default().push(Listener {
                id,
                callback: Box::new(callback),
            });
        }
        id
    }

    /// Unsubscribe. Unknown ids and destroyed kernels are no-ops.
    pub fn off(&mut self, kind: HookKind, id: ListenerId) {
        if self.destroyed {
            return;
        }
        if let Some(list) = self.listeners.get_mut(&kind) {
            list.retain(|listener| listener.id != id);
        }
    }

    /// Dispatch an event to every listener for its kind, in subscription
    /// order, one at a time. A failing listener never stops its siblings:
    /// errors are collected and each re-emitted as an `Error` event after
    /// the pass. Failures of `Error` listeners themselves are only logged,
    /// so error reporting cannot recurse.
    pub fn emit(&mut self, event: &mut HookEvent) {
        if self.destroyed {
            return;
        }

        let kind = event.kind();
        let mut errors = Vec::new();

        // Take the list out so listeners can't alias the kernel's map.
        let mut list = self.listeners.remove(&kind).unwrap_or_default();
        for listener in &mut list {
            if let Err(err) = (listener.callback)(event) {
                errors.push(err);
            }
        }
        self.listeners.entry(kind).or_insert(list);

        for err in errors {
            if kind == HookKind::Error {
                eprintln!("error listener failed: {err}");
            } else {
                let mut error_event = HookEvent::Error { error: err.into() };
                self.emit(&mut error_event);
            }
        }
    }

    /// Run `f`; on failure, surface the error as an `Error` event before
    /// handing it back to the caller. Wraps top-level build/serve entry
    /// points so failures are both observable and propagated.
    pub fn run_with_error_boundary<T, E>(&mut self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: std::fmt::Display,
    {
        match f() {
            Ok(value) => Ok(value),
            Err(err) => {
                let mut event = HookEvent::Error {
                    error: ErrorEvent::boundary(err.to_string()),
                };
                self.emit(&mut event);
                Err(err)
            }
        }
    }

    /// Tear the kernel down. Idempotent. Plugins are destroyed in reverse
    /// registration order so later plugins can rely on earlier ones during
    /// their own teardown; an individual failure is reported through the
    /// remaining `on_error` hooks and teardown continues.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        for name in self.order.iter().rev() {
            let Some(plugin) = self.plugins.get(name) else {
                continue;
            };
            let Some(hook) = plugin.on_destroy.as_ref() else {
                continue;
            };
            if let Err(source) = hook() {
                let report = ErrorEvent {
                    plugin: Some(name.clone()),
                    hook: Some(HookKind::Destroy),
                    message: source.to_string(),
                };
                // emit() is already inert; report directly.
                for other in &self.order {
                    if let Some(p) = self.plugins.get(other)
                        && let Some(on_error) = p.on_error.as_ref()
                        && let Err(err) = on_error(&report)
                    {
                        eprintln!("error hook of '{other}' failed during teardown: {err}");
                    }
                }
            }
        }

        self.plugins.clear();
        self.order.clear();
        self.listeners.clear();
    }

    /// Bridge each hook a plugin implements into the listener table.
    fn wire_hooks(&mut self, plugin: &Arc<DocsPlugin>) {
        fn wrap(plugin: &Arc<DocsPlugin>, kind: HookKind, source: Box<dyn std::error::Error + Send + Sync>) -> PluginError {
            PluginError {
                plugin: plugin.name.clone(),
                hook: kind,
                source,
            }
        }

        if plugin.on_config.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::Config, move |event| {
                if let (Some(hook), HookEvent::Config { config }) = (p.on_config.as_ref(), event) {
                    hook(config).map_err(|e| wrap(&p, HookKind::Config, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_content_load.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::ContentLoad, move |event| {
                if let (Some(hook), HookEvent::ContentLoad { files }) =
                    (p.on_content_load.as_ref(), event)
                {
                    hook(files).map_err(|e| wrap(&p, HookKind::ContentLoad, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_markdown_parse.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::MarkdownParse, move |event| {
                if let (Some(hook), HookEvent::MarkdownParse { url, ast }) =
                    (p.on_markdown_parse.as_ref(), event)
                {
                    hook(url, ast).map_err(|e| wrap(&p, HookKind::MarkdownParse, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_html_render.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::HtmlRender, move |event| {
                if let (Some(hook), HookEvent::HtmlRender { url, html }) =
                    (p.on_html_render.as_ref(), event)
                {
                    hook(url, html).map_err(|e| wrap(&p, HookKind::HtmlRender, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_build_start.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::BuildStart, move |event| {
                if let (Some(hook), HookEvent::BuildStart) = (p.on_build_start.as_ref(), event) {
                    hook().map_err(|e| wrap(&p, HookKind::BuildStart, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_build_end.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::BuildEnd, move |event| {
                if let (Some(hook), HookEvent::BuildEnd { manifest }) =
                    (p.on_build_end.as_ref(), event)
                {
                    hook(manifest).map_err(|e| wrap(&p, HookKind::BuildEnd, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_dev_server.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::DevServer, move |event| {
                if let (Some(hook), HookEvent::DevServer { address }) =
                    (p.on_dev_server.as_ref(), event)
                {
                    hook(address).map_err(|e| wrap(&p, HookKind::DevServer, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_file_change.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::FileChange, move |event| {
                if let (Some(hook), HookEvent::FileChange { path, kind }) =
                    (p.on_file_change.as_ref(), event)
                {
                    hook(path, *kind).map_err(|e| wrap(&p, HookKind::FileChange, e))?;
                }
                Ok(())
            });
        }
        if plugin.on_error.is_some() {
            let p = Arc::clone(plugin);
            self.on(HookKind::Error, move |event| {
                if let (Some(hook), HookEvent::Error { error }) = (p.on_error.as_ref(), event) {
                    hook(error).map_err(|e| wrap(&p, HookKind::Error, e))?;
                }
                Ok(())
            });
        }
        // on_destroy is not an emitted event; destroy() walks the registry
        // in reverse directly.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_plugin(name: &str, destroys: Arc<AtomicUsize>) -> DocsPlugin {
        DocsPlugin::new(name).on_destroy(move || {
            destroys.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut kernel = PluginKernel::new();
        kernel.register(DocsPlugin::new("x")).unwrap();
        let err = kernel.register(DocsPlugin::new("x")).unwrap_err();
        assert!(matches!(err, KernelError::DuplicatePlugin(name) if name == "x"));
        assert_eq!(kernel.list_plugins().len(), 1);
    }

    #[test]
    fn plugins_list_in_registration_order() {
        let mut kernel = PluginKernel::new();
        kernel
            .register(DocsPlugin::new("b"))
            .unwrap()
            .register(DocsPlugin::new("a"))
            .unwrap()
            .register(DocsPlugin::new("c"))
            .unwrap();
        let names: Vec<&str> = kernel.list_plugins().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn emit_runs_listeners_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut kernel = PluginKernel::new();
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            kernel.on(HookKind::BuildStart, move |_| {
                seen.lock().unwrap().push(tag);
                Ok(())
            });
        }
        kernel.emit(&mut HookEvent::BuildStart);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn a_failing_listener_does_not_skip_its_sibling() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let b_ran = Arc::new(AtomicUsize::new(0));

        let mut kernel = PluginKernel::new();
        kernel
            .register(DocsPlugin::new("broken").on_build_start(|| Err("boom".into())))
            .unwrap();
        {
            let b_ran = Arc::clone(&b_ran);
            kernel.on(HookKind::BuildStart, move |_| {
                b_ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let errors = Arc::clone(&errors);
            kernel
                .register(DocsPlugin::new("watcher").on_error(move |e| {
                    errors.lock().unwrap().push(e.clone());
                    Ok(())
                }))
                .unwrap();
        }

        kernel.emit(&mut HookEvent::BuildStart);

        assert_eq!(b_ran.load(Ordering::SeqCst), 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].plugin.as_deref(), Some("broken"));
        assert!(errors[0].message.contains("boom"));
    }

    #[test]
    fn transform_hooks_chain_in_registration_order() {
        let mut kernel = PluginKernel::new();
        kernel
            .register(DocsPlugin::new("a").on_html_render(|_, html| {
                html.push('a');
                Ok(())
            }))
            .unwrap()
            .register(DocsPlugin::new("b").on_html_render(|_, html| {
                html.push('b');
                Ok(())
            }))
            .unwrap();

        let mut event = HookEvent::HtmlRender {
            url: "/".into(),
            html: String::new(),
        };
        kernel.emit(&mut event);
        let HookEvent::HtmlRender { html, .. } = event else {
            panic!("event variant changed");
        };
        assert_eq!(html, "ab");
    }

    #[test]
    fn off_removes_a_listener() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut kernel = PluginKernel::new();
        let id = {
            let count = Arc::clone(&count);
            kernel.on(HookKind::BuildStart, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        kernel.emit(&mut HookEvent::BuildStart);
        kernel.off(HookKind::BuildStart, id);
        kernel.emit(&mut HookEvent::BuildStart);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroy_is_idempotent_and_fires_on_destroy_once() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut kernel = PluginKernel::new();
        kernel
            .register(counter_plugin("one", Arc::clone(&destroys)))
            .unwrap()
            .register(counter_plugin("two", Arc::clone(&destroys)))
            .unwrap();

        kernel.destroy();
        kernel.destroy();

        assert_eq!(destroys.load(Ordering::SeqCst), 2);
        assert!(kernel.list_plugins().is_empty());
        assert!(kernel.is_destroyed());
    }

    #[test]
    fn destroy_unwinds_in_reverse_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut kernel = PluginKernel::new();
        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            kernel
                .register(DocsPlugin::new(name).on_destroy(move || {
                    order.lock().unwrap().push(name);
                    Ok(())
                }))
                .unwrap();
        }
        kernel.destroy();
        assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn destroyed_kernel_is_inert() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut kernel = PluginKernel::new();
        kernel.destroy();

        assert!(matches!(
            kernel.register(DocsPlugin::new("late")),
            Err(KernelError::Destroyed)
        ));
        {
            let ran = Arc::clone(&ran);
            kernel.on(HookKind::BuildStart, move |_| {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        kernel.emit(&mut HookEvent::BuildStart);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn teardown_failure_does_not_abort_remaining_teardown() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let mut kernel = PluginKernel::new();
        kernel
            .register(counter_plugin("quiet", Arc::clone(&destroys)))
            .unwrap()
            .register(DocsPlugin::new("loud").on_destroy(|| Err("teardown boom".into())))
            .unwrap();

        // "loud" tears down first (reverse order) and fails; "quiet" must
        // still be destroyed.
        kernel.destroy();
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_boundary_reports_and_rethrows() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let mut kernel = PluginKernel::new();
        {
            let reported = Arc::clone(&reported);
            kernel
                .register(DocsPlugin::new("observer").on_error(move |e| {
                    reported.lock().unwrap().push(e.message.clone());
                    Ok(())
                }))
                .unwrap();
        }

        let result: Result<(), String> =
            kernel.run_with_error_boundary(|| Err("the sky fell".to_string()));
        assert!(result.is_err());
        assert_eq!(*reported.lock().unwrap(), vec!["the sky fell".to_string()]);
    }
}
