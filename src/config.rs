//! TOML configuration.
//!
//! Every key has a default, so an empty file (or no file at all) is a valid
//! configuration. Relative paths in the file are resolved against the
//! directory containing the file; nothing depends on the process's working
//! directory beyond how the user spelled the `--config` path.
//!
//! ```toml
//! [site]
//! posts_dir = "posts"
//! covers_url_prefix = "images/covers"
//!
//! [covers]
//! csv = "goodreads_library_export.csv"
//! since = "2020-01-01"
//! out_dir = "static/images/covers"
//! format = "webp"
//! quality = 80
//! max_width = 1200
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::encode::CoverFormat;
use crate::fetch::{DEFAULT_SOURCE_URL, ID_PLACEHOLDER};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub covers: CoversConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_posts_dir")]
    pub posts_dir: PathBuf,
    /// Public prefix prepended to cover file names in the book list.
    #[serde(default = "default_covers_url_prefix")]
    pub covers_url_prefix: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            posts_dir: default_posts_dir(),
            covers_url_prefix: default_covers_url_prefix(),
        }
    }
}

fn default_posts_dir() -> PathBuf {
    PathBuf::from("posts")
}
fn default_covers_url_prefix() -> String {
    "images/covers".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoversConfig {
    #[serde(default = "default_csv")]
    pub csv: PathBuf,
    #[serde(default = "default_since")]
    pub since: String,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_min_size")]
    pub min_size: u64,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_format")]
    pub format: CoverFormat,
    #[serde(default = "default_quality")]
    pub quality: u32,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CoversConfig {
    fn default() -> Self {
        Self {
            csv: default_csv(),
            since: default_since(),
            out_dir: default_out_dir(),
            min_size: default_min_size(),
            limit: None,
            format: default_format(),
            quality: default_quality(),
            max_width: default_max_width(),
            source_url: default_source_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_csv() -> PathBuf {
    PathBuf::from("goodreads_library_export.csv")
}
fn default_since() -> String {
    "2020-01-01".to_string()
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("static/images/covers")
}
fn default_min_size() -> u64 {
    1000
}
fn default_format() -> CoverFormat {
    CoverFormat::Webp
}
fn default_quality() -> u32 {
    80
}
fn default_max_width() -> u32 {
    1200
}
fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    20
}

impl Config {
    /// Re-root relative paths onto `base`.
    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.site.posts_dir,
            &mut self.covers.csv,
            &mut self.covers.out_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Load and validate the configuration at `path`.
///
/// A missing file yields the defaults; an unreadable or invalid one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate(&config)?;

    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.covers.quality > 100 {
        anyhow::bail!("covers.quality must be in [0, 100]");
    }

    if config.covers.timeout_secs == 0 {
        anyhow::bail!("covers.timeout_secs must be > 0");
    }

    if !config.covers.source_url.contains(ID_PLACEHOLDER) {
        anyhow::bail!(
            "covers.source_url must contain the '{}' placeholder",
            ID_PLACEHOLDER
        );
    }

    Ok(())
}
