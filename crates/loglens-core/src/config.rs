//! Engine configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, else the override in the data dir
//!    (~/.local/share/loglens/config/loglens.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::filter::{FilterEngine, DEFAULT_SEARCH_BINARY};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/loglens.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub insights: InsightsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    /// Where this config was read from (None for embedded defaults)
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightsConfig {
    /// Directories scanned for definition files; `~/` is expanded
    #[serde(default)]
    pub directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Set to false to never spawn the external search utility
    #[serde(default = "default_external")]
    pub external: bool,
}

fn default_binary() -> String {
    DEFAULT_SEARCH_BINARY.to_string()
}

fn default_external() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            external: default_external(),
        }
    }
}

impl EngineConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the data-dir override is
    /// used when present and the embedded defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "config file {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::embedded(),
        }
    }

    /// The embedded defaults
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::InvalidData(format!("Failed to read config: {}", e)))?;
        let mut config = Self::parse(&content)?;
        config.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Insight directories with `~/` expanded
    pub fn insight_dirs(&self) -> Vec<PathBuf> {
        self.insights
            .directories
            .iter()
            .map(|d| expand_home(d))
            .collect()
    }

    /// Filter engine honoring the `[search]` section
    pub fn filter_engine(&self) -> FilterEngine {
        if self.search.external {
            FilterEngine::with_binary(&self.search.binary)
        } else {
            FilterEngine::direct_only()
        }
    }
}

/// Default config override location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("loglens").join("config").join("loglens.toml"))
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
