use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parsing(#[from] toml::de::Error),
}

/// Resolved generator configuration. Plugins get one shot at mutating this
/// through `on_config` before the first build.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct DocsConfig {
    /// Content tree root.
    pub src_dir: PathBuf,
    /// Build output root.
    pub out_dir: PathBuf,
    /// Optional tera theme directory overriding the built-in layout.
    pub theme_dir: Option<PathBuf>,
    pub site: SiteConfig,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("docs"),
            out_dir: PathBuf::from("dist"),
            theme_dir: None,
            site: SiteConfig::default(),
        }
    }
}

impl DocsConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: DocsConfig = toml::from_str(&data)?;

        Ok(config)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: Option<String>,
    /// Absolute site origin used by manifest consumers like the sitemap
    /// plugin, e.g. `https://docs.example.com`.
    pub base_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Documentation".to_string(),
            description: None,
            base_url: None,
        }
    }
}
