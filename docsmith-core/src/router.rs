use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::frontmatter::{Frontmatter, FrontmatterValue, split_frontmatter};

const MARKDOWN_EXTENSIONS: [&str; 3] = ["md", "markdown", "mdown"];

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("route conflict: {first} and {second} both resolve to {url}")]
    RouteConflict {
        url: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// One scanned content file. Built during the source walk, open to
/// enrichment by `on_content_load` hooks, and frozen once routes are
/// generated from it.
#[derive(Debug, Clone)]
pub struct ContentFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub url: String,
    pub frontmatter: Frontmatter,
    /// Document body with the frontmatter block already stripped.
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Route {
    /// Canonical URL, possibly overridden by `frontmatter.path`.
    pub path: String,
    pub file_path: Option<PathBuf>,
    pub frontmatter: Frontmatter,
    /// Sort key in the sidebar. `f64::INFINITY` means "last".
    pub sidebar_position: f64,
}

impl Route {
    pub fn title(&self) -> String {
        if let Some(FrontmatterValue::String(title)) = self.frontmatter.get("title")
            && !title.is_empty()
        {
            return title.clone();
        }
        match last_segment(&self.path) {
            Some(segment) => kebab_to_title(segment),
            None => "Home".to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct NavItem {
    pub title: String,
    pub path: String,
    #[serde(skip)]
    position: f64,
}

/// One sidebar section: the routes sharing a parent directory, ordered by
/// their sidebar position.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NavSection {
    pub base_path: String,
    pub title: String,
    pub items: Vec<NavItem>,
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    by_url: HashMap<String, usize>,
    hierarchy: Vec<NavSection>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `source_root` depth-first and load every markdown file. A
    /// missing root is an empty site, not an error.
    pub fn scan<P: AsRef<Path>>(source_root: P) -> Result<Vec<ContentFile>, RouterError> {
        let source_root = source_root.as_ref();
        if !source_root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(source_root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || !is_markdown(path) {
                continue;
            }

            let raw = std::fs::read_to_string(path).map_err(|source| RouterError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let (frontmatter, body) = split_frontmatter(&raw);
            let relative_path = path.strip_prefix(source_root).unwrap_or(path).to_path_buf();

            files.push(ContentFile {
                url: path_to_url(&relative_path),
                path: path.to_path_buf(),
                relative_path,
                frontmatter,
                content: body.to_string(),
            });
        }

        Ok(files)
    }

    /// Rebuild the route table and sidebar hierarchy from a file list.
    /// Files are sorted by relative path first so the result is stable
    /// regardless of directory-walk order.
    pub fn generate_routes(&mut self, files: &[ContentFile]) -> Result<(), RouterError> {
        let mut sorted: Vec<&ContentFile> = files.iter().collect();
        sorted.sort_by(|a, b| {
            a.relative_path
                .to_string_lossy()
                .cmp(&b.relative_path.to_string_lossy())
        });

        self.routes.clear();
        self.by_url.clear();

        for file in sorted {
            let path = match file.frontmatter.get("path") {
                Some(FrontmatterValue::String(overridden)) => overridden.clone(),
                _ => file.url.clone(),
            };
            let sidebar_position = match file.frontmatter.get("order") {
                Some(FrontmatterValue::Number(n)) => *n,
                _ => f64::INFINITY,
            };

            if let Some(&existing) = self.by_url.get(&path) {
                return Err(RouterError::RouteConflict {
                    url: path,
                    first: self.routes[existing]
                        .file_path
                        .clone()
                        .unwrap_or_default(),
                    second: file.path.clone(),
                });
            }

            self.by_url.insert(path.clone(), self.routes.len());
            self.routes.push(Route {
                path,
                file_path: Some(file.path.clone()),
                frontmatter: file.frontmatter.clone(),
                sidebar_position,
            });
        }

        self.hierarchy = build_hierarchy(&self.routes);
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn hierarchy(&self) -> &[NavSection] {
        &self.hierarchy
    }

    /// Exact route lookup. A missing trailing slash is forgiven.
    pub fn match_url(&self, url: &str) -> Option<&Route> {
        if let Some(&idx) = self.by_url.get(url) {
            return Some(&self.routes[idx]);
        }
        if url != "/" && !url.ends_with('/') {
            let normalized = format!("{url}/");
            return self.by_url.get(&normalized).map(|&idx| &self.routes[idx]);
        }
        None
    }

    /// Routes strictly below `base_path`; the base itself is excluded.
    pub fn routes_by_base_path(&self, base_path: &str) -> Vec<&Route> {
        self.routes
            .iter()
            .filter(|r| r.path.starts_with(base_path) && r.path.len() > base_path.len())
            .collect()
    }
}

/// Canonical file-path to URL derivation: drop the extension, collapse
/// `index` onto its parent, and normalize to `/`-separated form with a
/// leading slash and (except for the root) a trailing slash.
pub fn path_to_url(relative_path: &Path) -> String {
    let stripped = relative_path.with_extension("");
    let mut segments: Vec<String> = stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if segments.last().is_some_and(|s| s == "index") {
        segments.pop();
    }
    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}/", segments.join("/"))
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext.as_str()))
}

/// Directory portion of a URL: every segment but the last.
fn base_path(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..=idx].to_string(),
    }
}

fn last_segment(url: &str) -> Option<&str> {
    url.split('/').filter(|s| !s.is_empty()).next_back()
}

/// `getting-started` -> `Getting Started`.
fn kebab_to_title(segment: &str) -> String {
    segment
        .split('-')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_hierarchy(routes: &[Route]) -> Vec<NavSection> {
    // BTreeMap keeps section order independent of hash state.
    let mut groups: BTreeMap<String, Vec<NavItem>> = BTreeMap::new();

    for route in routes {
        groups.entry(base_path(&route.path)).or_default().push(NavItem {
            title: route.title(),
            path: route.path.clone(),
            position: route.sidebar_position,
        });
    }

    groups
        .into_iter()
        .map(|(base, mut items)| {
            // Stable sort: equal positions keep their scan order.
            items.sort_by(|a, b| a.position.total_cmp(&b.position));
            let title = last_segment(&base).map(kebab_to_title).unwrap_or_default();
            NavSection {
                base_path: base,
                title,
                items,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file(relative: &str, frontmatter: &[(&str, FrontmatterValue)]) -> ContentFile {
        let relative_path = PathBuf::from(relative);
        ContentFile {
            url: path_to_url(&relative_path),
            path: PathBuf::from("/src").join(&relative_path),
            relative_path,
            frontmatter: frontmatter
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            content: String::new(),
        }
    }

    #[test]
    fn url_derivation_is_bit_exact() {
        assert_eq!(
            path_to_url(Path::new("guide/getting-started.md")),
            "/guide/getting-started/"
        );
        assert_eq!(path_to_url(Path::new("index.md")), "/");
        assert_eq!(path_to_url(Path::new("guide/index.md")), "/guide/");
        assert_eq!(path_to_url(Path::new("a.markdown")), "/a/");
    }

    #[test]
    fn urls_have_leading_and_trailing_slashes() {
        for input in ["x.md", "a/b/c.md", "deep/nested/index.md", "index.md"] {
            let url = path_to_url(Path::new(input));
            assert!(url.starts_with('/'), "{url}");
            assert!(url == "/" || url.ends_with('/'), "{url}");
        }
    }

    #[test]
    fn ordered_routes_sort_before_unordered() {
        let files = vec![
            file("b.md", &[]),
            file("a.md", &[("order", FrontmatterValue::Number(2.0))]),
        ];
        let mut router = Router::new();
        router.generate_routes(&files).unwrap();

        let sections = router.hierarchy();
        assert_eq!(sections.len(), 1);
        let paths: Vec<&str> = sections[0].items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["/a/", "/b/"]);
    }

    #[test]
    fn frontmatter_path_override_wins() {
        let files = vec![file(
            "old-name.md",
            &[("path", FrontmatterValue::String("/why/".into()))],
        )];
        let mut router = Router::new();
        router.generate_routes(&files).unwrap();
        assert!(router.match_url("/why/").is_some());
        assert!(router.match_url("/old-name/").is_none());
    }

    #[test]
    fn duplicate_urls_are_a_route_conflict() {
        let files = vec![
            file("a.md", &[("path", FrontmatterValue::String("/same/".into()))]),
            file("b.md", &[("path", FrontmatterValue::String("/same/".into()))]),
        ];
        let mut router = Router::new();
        let err = router.generate_routes(&files).unwrap_err();
        assert!(matches!(err, RouterError::RouteConflict { url, .. } if url == "/same/"));
    }

    #[test]
    fn match_url_forgives_missing_trailing_slash() {
        let files = vec![file("guide/setup.md", &[]), file("index.md", &[])];
        let mut router = Router::new();
        router.generate_routes(&files).unwrap();
        assert!(router.match_url("/guide/setup").is_some());
        assert!(router.match_url("/guide/setup/").is_some());
        assert!(router.match_url("/").is_some());
        assert!(router.match_url("/missing/").is_none());
    }

    #[test]
    fn base_path_lookup_excludes_the_base_itself() {
        let files = vec![
            file("guide/index.md", &[]),
            file("guide/setup.md", &[]),
            file("api.md", &[]),
        ];
        let mut router = Router::new();
        router.generate_routes(&files).unwrap();

        let below: Vec<&str> = router
            .routes_by_base_path("/guide/")
            .iter()
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(below, vec!["/guide/setup/"]);
    }

    #[test]
    fn hierarchy_titles_from_frontmatter_or_segment() {
        let files = vec![
            file(
                "guide/getting-started.md",
                &[("title", FrontmatterValue::String("Start Here".into()))],
            ),
            file("guide/advanced-usage.md", &[]),
        ];
        let mut router = Router::new();
        router.generate_routes(&files).unwrap();

        let section = &router.hierarchy()[0];
        assert_eq!(section.base_path, "/guide/");
        assert_eq!(section.title, "Guide");
        let titles: Vec<&str> = section.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Advanced Usage", "Start Here"]);
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let files = Router::scan("/definitely/not/a/real/dir").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn scan_reads_frontmatter_and_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("guide")).unwrap();
        let mut f = std::fs::File::create(dir.path().join("guide/index.md")).unwrap();
        writeln!(f, "---\ntitle: Guide\n---\n# Hi").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = Router::scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].url, "/guide/");
        assert_eq!(
            files[0].frontmatter.get("title"),
            Some(&FrontmatterValue::String("Guide".into()))
        );
        assert!(files[0].content.contains("# Hi"));
    }
}
