//! Standalone run command

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use loglens_core::{AIClient, AiDispatcher, InsightCatalog, PromptLibrary, StandaloneRunner};

use super::load_config;

/// Run one definition over `files`; returns the process exit code
pub async fn cmd_run(
    config_path: Option<&Path>,
    definition: &Path,
    files: &[PathBuf],
    ai: bool,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let mut runner = StandaloneRunner::new(InsightCatalog::builtin(), config.filter_engine());

    if ai {
        match AIClient::from_env() {
            Some(client) => {
                if !client.health_check().await {
                    tracing::warn!(
                        host = client.host(),
                        model = client.model(),
                        "AI backend is not reachable; the follow-up will record an error"
                    );
                }
                runner = runner.with_ai(Arc::new(client), PromptLibrary::new());
            }
            None => {
                eprintln!("⚠️  --ai given but no AI backend is configured");
                eprintln!("   Set OLLAMA_HOST (and optionally OLLAMA_MODEL), or AI_BACKEND=mock");
            }
        }
    }

    let out = Arc::new(Mutex::new(io::stdout()));
    let status = runner
        .run(definition, files, out, &mut io::stderr())
        .await;

    tracing::debug!(status = ?status, "Standalone run finished");
    Ok(status.exit_code())
}
