//! Configuration management for the query engine
//!
//! Default config location: ./pulse.toml

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the document search engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Sent as `Authorization: ApiKey <key>`; takes precedence over basic auth
    #[serde(default)]
    pub api_key: Option<String>,
    /// Connect timeout only. Requests themselves carry no deadline.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_batch_endpoint")]
    pub batch_endpoint: String,
}

fn default_engine_url() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_batch_endpoint() -> String {
    "/_msearch".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            username: None,
            password: None,
            api_key: None,
            connect_timeout_ms: default_connect_timeout(),
            batch_endpoint: default_batch_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_root")]
    pub root: PathBuf,
    /// Keep loaded templates in memory
    #[serde(default = "default_true")]
    pub cache: bool,
}

fn default_template_root() -> PathBuf {
    PathBuf::from("./templates")
}

fn default_true() -> bool {
    true
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            root: default_template_root(),
            cache: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookupConfig {
    /// Identifiers shorter than this are rejected by search-based lookups
    #[serde(default = "default_min_id_length")]
    pub min_id_length: usize,
}

fn default_min_id_length() -> usize {
    8
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            min_id_length: default_min_id_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PagingConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_max_pages() -> usize {
    100
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_level")]
    pub level: String,
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info,pulse=debug".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            let mut config = Config::default();
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = config.save(config_path);
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load config from an existing file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;
        config.expand_paths()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.engine.url.starts_with("http://") && !self.engine.url.starts_with("https://") {
            return Err(anyhow!(
                "engine.url must start with http:// or https://, got '{}'",
                self.engine.url
            ));
        }
        if self.engine.password.is_some() && self.engine.username.is_none() {
            return Err(anyhow!("engine.password is set without engine.username"));
        }
        if self.paging.max_pages == 0 {
            return Err(anyhow!("paging.max_pages must be at least 1"));
        }
        Ok(())
    }

    fn expand_paths(&mut self) -> Result<()> {
        self.templates.root = expand_tilde(&self.templates.root)?;
        Ok(())
    }
}
