//! TOML configuration parsing and validation.
//!
//! ```toml
//! [search]
//! window_size = 50
//! timeout_secs = 30
//! max_retries = 0
//!
//! [history]
//! enabled = true
//! path = "./data/history.sqlite"
//!
//! [sources.prod]
//! address = "https://repo.example.com/api"
//! display_name = "Production"
//! selected = true
//! ```
//!
//! Every section is optional. Sources are named instances: the table key
//! (`prod` above) becomes the source id.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Page size requested from each source.
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    /// Per-source request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for HTTP 429, 5xx, and network errors.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_window_size() -> u64 {
    50
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_enabled")]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_history_enabled(),
            path: default_history_path(),
        }
    }
}

fn default_history_enabled() -> bool {
    true
}
fn default_history_path() -> PathBuf {
    PathBuf::from("./data/history.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Whether the source takes part in searches without an explicit `--source`.
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl Config {
    /// Defaults only: no sources, history at the default path.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.window_size == 0 {
        anyhow::bail!("search.window_size must be > 0");
    }
    if config.search.timeout_secs == 0 {
        anyhow::bail!("search.timeout_secs must be > 0");
    }

    for (id, source) in &config.sources {
        if id.trim().is_empty() {
            anyhow::bail!("source ids must not be empty");
        }
        if !(source.address.starts_with("http://") || source.address.starts_with("https://")) {
            anyhow::bail!(
                "sources.{}.address must start with http:// or https:// (got '{}')",
                id,
                source.address
            );
        }
    }

    Ok(())
}
