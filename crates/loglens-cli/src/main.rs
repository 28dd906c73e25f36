//! Loglens CLI - Pluggable log-insight engine
//!
//! Usage:
//!   loglens run crashes.yaml app.log     Run one insight definition
//!   loglens list                         List published insights
//!   loglens watch                        Hot-reload insight definitions
//!   loglens search -p 'FATAL' app.log    Ad-hoc pattern search

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr; stdout carries results only
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            definition,
            files,
            ai,
        } => {
            let code = commands::cmd_run(config, &definition, &files, ai).await?;
            std::process::exit(code);
        }
        Commands::List { dir, json } => commands::cmd_list(config, &dir, json),
        Commands::Watch { dir } => commands::cmd_watch(config, &dir).await,
        Commands::Search {
            pattern,
            context,
            case_sensitive,
            direct,
            json,
            files,
        } => commands::cmd_search(
            config,
            &commands::SearchArgs {
                pattern,
                context,
                case_sensitive,
                direct,
                json,
            },
            &files,
        ),
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::AiStatus => commands::cmd_ai_status().await,
    }
}
