use crate::config::CliConfig;
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use docsmith_core::{DocsBuilder, HtmlAdapter, plugins};

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source directory containing markdown files"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for the generated site"),
        )
        .arg(
            Arg::new("theme")
                .short('t')
                .long("theme")
                .value_name("DIR")
                .help("Theme directory with tera templates"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the documentation site")
}

/// Assemble a builder with the stock plugins wired in. Shared with `serve`.
pub fn make_builder(config: &CliConfig) -> Result<DocsBuilder> {
    let docs = config.docs_config();
    let mut builder = DocsBuilder::new(docs.clone(), &HtmlAdapter)?;
    builder.register(plugins::syntax_highlight(plugins::DEFAULT_SYNTAX_THEME))?;
    if let Some(base_url) = &docs.site.base_url {
        builder.register(plugins::sitemap(base_url.clone(), &docs.out_dir))?;
    }
    Ok(builder)
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = CliConfig::load(args)?;

    let mut builder = make_builder(&config)?;
    let manifest = builder.build()?;
    builder.kernel_mut().destroy();

    println!(
        "Built {} pages and {} assets in {:?} -> {}",
        manifest.pages.len(),
        manifest.assets.len(),
        manifest.build_time,
        config.docs_config().out_dir.display()
    );

    Ok(())
}
