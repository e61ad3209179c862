use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration merging CLI args, env vars, the config file,
/// and defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Command configuration (config file path, dev server knobs)
    pub build: BuildConfig,
    /// Generator configuration (from docsmith-core)
    #[serde(flatten)]
    pub docs: docsmith_core::DocsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Configuration file path
    pub config: String,
    /// Host for the dev server
    pub host: String,
    /// Port for the dev server
    pub port: u16,
    /// Open the browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            config: "./docsmith.toml".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            docs: docsmith_core::DocsConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (DOCSMITH_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .get_one::<String>("config")
            .cloned()
            .unwrap_or_else(|| "./docsmith.toml".to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add the configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::with_name(&config_file.replace(".toml", "")));
        }

        // 3. Add environment variables with DOCSMITH_ prefix
        builder = builder.add_source(
            Environment::with_prefix("DOCSMITH")
                .prefix_separator("_")
                .separator("__"), // Double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        let mut cli_overrides = std::collections::HashMap::new();

        if let Some(source) = args.get_one::<String>("source") {
            cli_overrides.insert("src_dir".to_string(), source.clone());
        }
        if let Some(output) = args.get_one::<String>("output") {
            cli_overrides.insert("out_dir".to_string(), output.clone());
        }
        if let Some(theme) = args.get_one::<String>("theme") {
            cli_overrides.insert("theme_dir".to_string(), theme.clone());
        }
        if let Some(config) = args.get_one::<String>("config") {
            cli_overrides.insert("build.config".to_string(), config.clone());
        }
        // Only override with args that are actually defined for this command
        if let Some(host) = args.try_get_one::<String>("host").unwrap_or(None) {
            cli_overrides.insert("build.host".to_string(), host.clone());
        }
        if let Some(port) = args.try_get_one::<String>("port").unwrap_or(None) {
            cli_overrides.insert("build.port".to_string(), port.clone());
        }
        if args.try_get_one::<bool>("open").unwrap_or(None) == Some(&true) {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(config::Config::try_from(&cli_overrides)?);
        }

        let config = builder.build()?;
        let cli_config: CliConfig = config.try_deserialize()?;

        Ok(cli_config)
    }

    /// Just the generator configuration, for handing to docsmith-core
    pub fn docs_config(&self) -> &docsmith_core::DocsConfig {
        &self.docs
    }

    /// The command configuration
    pub fn build_config(&self) -> &BuildConfig {
        &self.build
    }
}
