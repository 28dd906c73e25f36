//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `run` - Standalone run of one insight definition
//! - `insights` - Registry commands (list, watch)
//! - `search` - Ad-hoc filter search
//! - `prompts` - Prompt library management commands
//! - `ai` - AI backend status

pub mod ai;
pub mod insights;
pub mod prompts;
pub mod run;
pub mod search;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loglens_core::EngineConfig;

// Re-export command functions for main.rs
pub use ai::*;
pub use insights::*;
pub use prompts::*;
pub use run::*;
pub use search::*;

/// Load the engine config, honoring `--config`
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load(path).context("Failed to load engine config")
}

/// Insight directories from `--dir`, else from the config
pub fn resolve_dirs(config: &EngineConfig, dirs: &[PathBuf]) -> Vec<PathBuf> {
    if dirs.is_empty() {
        config.insight_dirs()
    } else {
        dirs.to_vec()
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
