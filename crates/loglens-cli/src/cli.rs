//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Loglens - Run pluggable insights over log files
#[derive(Parser)]
#[command(name = "loglens")]
#[command(about = "Pluggable log-insight execution engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single insight definition over log files
    ///
    /// Exit codes: 0 success, 1 the definition failed to load,
    /// 2 the analysis failed or was cancelled.
    Run {
        /// Insight definition file (.yaml/.yml)
        definition: PathBuf,

        /// Log files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Request an AI follow-up when the insight's auto trigger fires
        ///
        /// Uses AI_BACKEND / OLLAMA_HOST / OLLAMA_MODEL.
        #[arg(long)]
        ai: bool,
    },

    /// Load every definition and list published insights and load errors
    List {
        /// Insight directory (repeatable; overrides the config)
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load every definition and reload on change until Ctrl-C
    Watch {
        /// Insight directory (repeatable; overrides the config)
        #[arg(short, long)]
        dir: Vec<PathBuf>,
    },

    /// Ad-hoc pattern search with context
    Search {
        /// Regular expression to match
        #[arg(short, long)]
        pattern: String,

        /// Lines of context after each match
        #[arg(short = 'A', long, default_value = "0")]
        context: usize,

        /// Match case-sensitively
        #[arg(short = 's', long)]
        case_sensitive: bool,

        /// Skip the external search utility
        #[arg(long)]
        direct: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Files to search
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Manage AI prompts (list, show, path)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Check the configured AI backend
    AiStatus,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (explain, recommend)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
