use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use docsmith_core::{DocsBuilder, DocsConfig, DocsPlugin, HtmlAdapter};

fn site(files: &[(&str, &str)]) -> (tempfile::TempDir, DocsConfig) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("docs");
    for (relative, content) in files {
        let path = src.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    let config = DocsConfig {
        src_dir: src,
        out_dir: dir.path().join("dist"),
        ..Default::default()
    };
    (dir, config)
}

#[test]
fn urls_map_onto_the_output_tree() {
    let (dir, config) = site(&[
        ("index.md", "# Welcome\n"),
        ("guide/index.md", "---\ntitle: Guide\n---\n# Hi\n"),
    ]);

    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    let manifest = builder.build().unwrap();

    assert_eq!(manifest.pages.len(), 2);
    let root = std::fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(root.contains("Welcome"));
    let guide = std::fs::read_to_string(dir.path().join("dist/guide/index.html")).unwrap();
    assert!(guide.contains("<h1 id=\"hi\">Hi</h1>"));
    assert!(guide.contains("<title>Guide"));
}

#[test]
fn sidebar_orders_by_frontmatter_order() {
    let (_dir, config) = site(&[
        ("a.md", "---\norder: 2\n---\n# A\n"),
        ("b.md", "# B\n"),
    ]);

    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    builder.build().unwrap();

    let sections = builder.router().hierarchy();
    assert_eq!(sections.len(), 1);
    let paths: Vec<&str> = sections[0].items.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, vec!["/a/", "/b/"]);
}

#[test]
fn missing_source_dir_builds_an_empty_site() {
    let dir = tempfile::tempdir().unwrap();
    let config = DocsConfig {
        src_dir: dir.path().join("no-such-docs"),
        out_dir: dir.path().join("dist"),
        ..Default::default()
    };

    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    let manifest = builder.build().unwrap();
    assert!(manifest.pages.is_empty());
    assert!(dir.path().join("dist").is_dir());
}

#[test]
fn assets_are_copied_to_the_output_root() {
    let (dir, config) = site(&[("index.md", "# Home\n")]);
    let assets = config.src_dir.join("assets/css");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("main.css"), "body {}").unwrap();

    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    let manifest = builder.build().unwrap();

    assert_eq!(manifest.assets.len(), 1);
    assert_eq!(
        manifest.assets[0].output_path,
        PathBuf::from("assets/css/main.css")
    );
    assert!(dir.path().join("dist/assets/css/main.css").is_file());
}

#[test]
fn plugins_thread_through_the_whole_pipeline() {
    let (dir, config) = site(&[("index.md", "# Home\n")]);
    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    {
        let events = Arc::clone(&events);
        let events2 = Arc::clone(&events);
        let events3 = Arc::clone(&events);
        builder
            .register(
                DocsPlugin::new("tracer")
                    .on_build_start(move || {
                        events.lock().unwrap().push("start");
                        Ok(())
                    })
                    .on_html_render(|_url, html| {
                        html.push_str("<!-- injected -->");
                        Ok(())
                    })
                    .on_build_end(move |manifest| {
                        assert_eq!(manifest.pages.len(), 1);
                        events2.lock().unwrap().push("end");
                        Ok(())
                    })
                    .on_destroy(move || {
                        events3.lock().unwrap().push("destroy");
                        Ok(())
                    }),
            )
            .unwrap();
    }

    builder.build().unwrap();
    builder.kernel_mut().destroy();

    assert_eq!(*events.lock().unwrap(), vec!["start", "end", "destroy"]);
    let html = std::fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(html.contains("<!-- injected -->"));
}

#[test]
fn content_load_hooks_may_replace_the_file_list() {
    let (dir, config) = site(&[("index.md", "# Home\n")]);

    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    builder
        .register(DocsPlugin::new("synthesizer").on_content_load(|files| {
            let mut synthetic = files[0].clone();
            synthetic.url = "/generated/".to_string();
            synthetic.relative_path = PathBuf::from("generated.md");
            synthetic.path = PathBuf::from("virtual/generated.md");
            synthetic.content = "# Synthesized\n".to_string();
            files.push(synthetic);
            Ok(())
        }))
        .unwrap();

    let manifest = builder.build().unwrap();
    assert_eq!(manifest.pages.len(), 2);
    let generated =
        std::fs::read_to_string(dir.path().join("dist/generated/index.html")).unwrap();
    assert!(generated.contains("Synthesized"));
}

#[test]
fn a_failing_stage_aborts_with_no_partial_manifest() {
    let (_dir, config) = site(&[
        ("a.md", "---\npath: /same/\n---\n# A\n"),
        ("b.md", "---\npath: /same/\n---\n# B\n"),
    ]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut builder = DocsBuilder::new(config, &HtmlAdapter).unwrap();
    {
        let seen = Arc::clone(&seen);
        builder
            .register(DocsPlugin::new("observer").on_error(move |e| {
                seen.lock().unwrap().push(e.message.clone());
                Ok(())
            }))
            .unwrap();
    }

    assert!(builder.build().is_err());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("route conflict"));
}
