//! Registry command implementations (list, watch)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use loglens_core::registry::{load_all, ReloadReport};
use loglens_core::{
    InsightCatalog, InsightRegistry, LoadError, RegistrySnapshot, RegistryWatcher,
};
use serde_json::json;

use super::{load_config, resolve_dirs, truncate};

/// Load every definition and print what was published
pub fn cmd_list(config_path: Option<&Path>, dirs: &[PathBuf], json_output: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let dirs = resolve_dirs(&config, dirs);
    let (snapshot, errors) = load_all(&dirs, &InsightCatalog::builtin(), &config.filter_engine());

    if json_output {
        let output = json!({
            "directories": dirs,
            "insights": snapshot.iter().map(|d| d.as_ref()).collect::<Vec<_>>(),
            "errors": errors.iter().map(load_error_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_snapshot(&snapshot);
    print_load_errors(&errors);
    Ok(())
}

/// Load every definition, then reload on change until Ctrl-C
pub async fn cmd_watch(config_path: Option<&Path>, dirs: &[PathBuf]) -> Result<()> {
    let config = load_config(config_path)?;
    let dirs = resolve_dirs(&config, dirs);

    let registry = Arc::new(InsightRegistry::new(
        dirs.clone(),
        InsightCatalog::builtin(),
        config.filter_engine(),
    ));
    let errors = registry.rescan();
    print_snapshot(&registry.snapshot());
    print_load_errors(&errors);

    let handle = RegistryWatcher::new(registry.clone())
        .start(log_reload)
        .context("Failed to start insight watcher")?;

    println!();
    for dir in &dirs {
        println!("👀 Watching {}", dir.display());
    }
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    handle.stop().await;
    println!("Stopped.");
    Ok(())
}

fn log_reload(report: ReloadReport) {
    for path in &report.paths {
        match report.snapshot.for_source(path) {
            Some(descriptor) => {
                tracing::info!(path = %path.display(), insight = %descriptor.id, "Insight reloaded")
            }
            None => tracing::info!(path = %path.display(), "No insight published from file"),
        }
    }
    for error in &report.errors {
        tracing::warn!(
            path = %error.path.display(),
            kind = error.kind.as_str(),
            "{}",
            error.message
        );
    }
    tracing::info!(insights = report.snapshot.len(), "Registry updated");
}

fn print_snapshot(snapshot: &RegistrySnapshot) {
    if snapshot.is_empty() {
        println!("No insights published.");
        return;
    }

    println!("Insights ({}):\n", snapshot.len());
    println!(
        "{:<28} {:<11} {:<12} {:<30}  {}",
        "ID", "KIND", "FOLDER", "NAME", "AI"
    );
    println!("{}", "-".repeat(90));

    for descriptor in snapshot.iter() {
        let ai = match (descriptor.ai.enabled, descriptor.ai.auto) {
            (false, _) => "off".to_string(),
            (true, false) => format!("manual/{}", descriptor.ai.prompt_type),
            (true, true) => format!("auto/{}", descriptor.ai.prompt_type),
        };
        println!(
            "{:<28} {:<11} {:<12} {:<30}  {}",
            truncate(&descriptor.id, 28),
            descriptor.kind,
            descriptor.folder.as_deref().unwrap_or("-"),
            truncate(&descriptor.name, 30),
            ai
        );
    }
}

fn print_load_errors(errors: &[LoadError]) {
    if errors.is_empty() {
        return;
    }

    eprintln!();
    eprintln!("⚠️  {} definition(s) failed to load:", errors.len());
    for error in errors {
        eprintln!("  {}", error);
    }
}

fn load_error_json(error: &LoadError) -> serde_json::Value {
    json!({
        "path": error.path,
        "kind": error.kind.as_str(),
        "message": error.message,
    })
}
