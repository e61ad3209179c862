//! Incremental development server for docsmith sites.
//!
//! Serves the last successful build over HTTP, watches the source tree,
//! debounces change bursts into single rebuilds, and pushes `reload`
//! messages to connected browsers over the `/__hmr` WebSocket channel.

mod debounce;
mod static_files;

pub use debounce::{EventDebouncer, FsEvent};
pub use static_files::{content_type, inject_reload_script, resolve};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use docsmith_core::{ChangeKind, DocsBuilder, HookEvent};

/// How long a change burst may grow before one rebuild fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    /// Open the browser once the server is up.
    pub open: bool,
    pub debounce: Duration,
}

impl Default for DevServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
            debounce: DEBOUNCE_WINDOW,
        }
    }
}

#[derive(Clone)]
struct AppState {
    out_dir: PathBuf,
    reload_tx: broadcast::Sender<String>,
}

struct Running {
    addr: SocketAddr,
    server: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

/// The development server. `Stopped -> Running -> Stopped`; starting while
/// running and closing while stopped are both no-ops.
pub struct DevServer {
    builder: Arc<Mutex<DocsBuilder>>,
    options: DevServerOptions,
    running: Option<Running>,
}

impl DevServer {
    pub fn new(builder: DocsBuilder, options: DevServerOptions) -> Self {
        Self {
            builder: Arc::new(Mutex::new(builder)),
            options,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bind, run one full build, start watching, and announce the server
    /// to plugins. Returns the bound address; calling `start` again while
    /// running just returns it.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.addr);
        }

        let (src_dir, out_dir) = {
            let builder = self.builder.lock().await;
            (
                builder.config().src_dir.clone(),
                builder.config().out_dir.clone(),
            )
        };

        let bind_addr = format!("{}:{}", self.options.host, self.options.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        let addr = listener.local_addr()?;

        {
            let mut builder = self.builder.lock().await;
            builder.build().context("initial build failed")?;
            let mut event = HookEvent::DevServer {
                address: format!("http://{addr}"),
            };
            builder.kernel_mut().emit(&mut event);
        }

        let (reload_tx, _) = broadcast::channel::<String>(100);
        let state = AppState {
            out_dir,
            reload_tx: reload_tx.clone(),
        };

        let app = Router::new()
            .route("/__hmr", get(hmr_handler))
            .fallback(get(serve_static))
            .with_state(state);

        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!("dev server stopped: {err}");
            }
        });

        let watcher = {
            let builder = Arc::clone(&self.builder);
            let debounce = self.options.debounce;
            tokio::spawn(async move {
                if let Err(err) = watch_and_rebuild(src_dir, builder, reload_tx, debounce).await {
                    tracing::error!("file watcher stopped: {err}");
                }
            })
        };

        tracing::info!("serving at http://{addr}");
        if self.options.open
            && let Err(err) = open::that(format!("http://{addr}"))
        {
            tracing::warn!("failed to open browser: {err}");
        }

        self.running = Some(Running {
            addr,
            server,
            watcher,
        });
        Ok(addr)
    }

    /// Disconnect clients, stop listening, and destroy the kernel so
    /// plugin teardown cascades. Idempotent.
    pub async fn close(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.watcher.abort();
        running.server.abort();
        self.builder.lock().await.kernel_mut().destroy();
    }

    /// Access to the shared builder, mainly for tests and embedding.
    pub fn builder(&self) -> Arc<Mutex<DocsBuilder>> {
        Arc::clone(&self.builder)
    }
}

async fn watch_and_rebuild(
    src_dir: PathBuf,
    builder: Arc<Mutex<DocsBuilder>>,
    reload_tx: broadcast::Sender<String>,
    debounce: Duration,
) -> Result<()> {
    let debouncer = Arc::new(EventDebouncer::new(debounce));

    let recorder = Arc::clone(&debouncer);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Added,
            EventKind::Modify(_) => ChangeKind::Changed,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => return,
        };
        for path in event.paths {
            recorder.record(path.clone(), kind);
        }
    })?;
    watcher.watch(&src_dir, RecursiveMode::Recursive)?;
    tracing::info!("watching {}", src_dir.display());

    let mut tick = tokio::time::interval(Duration::from_millis(25));
    loop {
        tick.tick().await;
        let events = debouncer.drain_ready();
        if events.is_empty() {
            continue;
        }

        // Rebuilds serialize behind the builder lock; changes landing
        // mid-build keep coalescing in the debouncer and come out as one
        // follow-up rebuild.
        let mut builder = builder.lock().await;
        for event in &events {
            tracing::debug!("{:?}: {}", event.kind, event.path.display());
            let mut hook = HookEvent::FileChange {
                path: event.path.clone(),
                kind: event.kind,
            };
            builder.kernel_mut().emit(&mut hook);
        }

        match builder.build() {
            Ok(manifest) => {
                tracing::info!(
                    "rebuilt {} pages in {:?}",
                    manifest.pages.len(),
                    manifest.build_time
                );
                let _ = reload_tx.send("reload".to_string());
            }
            Err(err) => {
                // Keep serving the last good build.
                tracing::error!("rebuild failed: {err}");
            }
        }
    }
}

async fn hmr_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| hmr_connection(socket, state.reload_tx))
}

async fn hmr_connection(mut socket: WebSocket, reload_tx: broadcast::Sender<String>) {
    let mut rx = reload_tx.subscribe();

    if socket.send(Message::Text("connected".into())).await.is_err() {
        return;
    }

    let mut keepalive = tokio::time::interval(Duration::from_secs(30));
    keepalive.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(reload) => {
                        if socket.send(Message::Text(reload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            _ = keepalive.tick() => {
                if socket.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

async fn serve_static(State(state): State<AppState>, uri: Uri) -> Response {
    if let Some(file) = resolve(&state.out_dir, uri.path()) {
        return file_response(&file, StatusCode::OK).await;
    }

    // SPA-style fallback before a real 404.
    let fallback = state.out_dir.join("index.html");
    if fallback.is_file() {
        return file_response(&fallback, StatusCode::OK).await;
    }

    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

async fn file_response(path: &std::path::Path, status: StatusCode) -> Response {
    let content_type = content_type(path);
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            if content_type.starts_with("text/html") {
                let html = inject_reload_script(&String::from_utf8_lossy(&bytes));
                (status, [(header::CONTENT_TYPE, content_type)], html).into_response()
            } else {
                (status, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
            }
        }
        Err(err) => {
            tracing::error!("failed to read {}: {err}", path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
        }
    }
}
