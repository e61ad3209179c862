//! Static resolution of built output, with live-reload script injection
//! for HTML responses.

use std::path::{Path, PathBuf};

/// Fixed extension-to-MIME table. Anything unknown is served as bytes.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "md" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Resolve a request path against the output root. Directory-style URLs
/// resolve to their `index.html`. Returns `None` when nothing matches or
/// the path tries to escape the root.
pub fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = url_path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }

    let mut full = if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    };
    if full.is_dir() {
        full = full.join("index.html");
    }
    full.is_file().then_some(full)
}

/// Browser half of the reload channel: connect to `/__hmr`, reload the
/// page when the server says so.
const RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    const socket = new WebSocket('ws://' + location.host + '/__hmr');
    socket.onmessage = function(event) {
        if (event.data === 'reload') {
            location.reload();
        }
    };
    socket.onclose = function() {
        console.log('docsmith live reload disconnected');
    };
})();
</script>
"#;

/// Inject the live-reload client before the closing body tag, or at the
/// end when the document has none.
pub fn inject_reload_script(html: &str) -> String {
    if let Some(pos) = html.rfind("</body>") {
        let mut result = String::with_capacity(html.len() + RELOAD_SCRIPT.len());
        result.push_str(&html[..pos]);
        result.push_str(RELOAD_SCRIPT);
        result.push_str(&html[pos..]);
        result
    } else {
        format!("{html}{RELOAD_SCRIPT}")
    }
}
