//! Ad-hoc search command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loglens_core::insights::{MatchReport, PostProcessor};
use loglens_core::{FilterEngine, FilterSpec, ReadingMode};

use super::load_config;

/// Options for `loglens search`
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub pattern: String,
    pub context: usize,
    pub case_sensitive: bool,
    pub direct: bool,
    pub json: bool,
}

/// Run one filter over `files` and print the matches
pub fn cmd_search(config_path: Option<&Path>, args: &SearchArgs, files: &[PathBuf]) -> Result<()> {
    let config = load_config(config_path)?;

    let (engine, mode) = if args.direct {
        (FilterEngine::direct_only(), ReadingMode::Direct)
    } else {
        (config.filter_engine(), ReadingMode::FastExternal)
    };

    let spec = FilterSpec::new(&args.pattern)
        .with_context(args.context)
        .with_reading_mode(mode)
        .case_sensitive(args.case_sensitive);

    tracing::debug!(
        pattern = %args.pattern,
        mode = %mode,
        external = engine.has_external(),
        files = files.len(),
        "Searching"
    );

    let result = engine
        .search(&spec, files)
        .with_context(|| format!("Search for {:?} failed", args.pattern))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print!("{}", MatchReport.process(&result).content);

    for warning in &result.warnings {
        eprintln!("⚠️  {}: {}", warning.path.display(), warning.message);
    }

    Ok(())
}
