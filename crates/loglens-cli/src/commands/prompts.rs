//! Prompt library commands

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use loglens_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

/// Print the built-in prompts and where each one resolves from
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!("{:<12} {:>7}  {:<8} {}", "ID", "VERSION", "SOURCE", "OVERRIDE FILE");
    println!("{}", "-".repeat(60));

    for info in library.list() {
        let (source, file) = match &info.override_path {
            Some(path) => ("override", path.display().to_string()),
            None => ("builtin", "-".to_string()),
        };
        println!("{:<12} {:>7}  {:<8} {}", info.id, info.version, source, file);
    }

    println!();
    println!("Templates must keep exactly one {{result_content}} placeholder.");
    println!("Run `loglens prompts path` to see where overrides are read from.");

    Ok(())
}

/// Print one resolved prompt; unknown ids are an error
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let Some(id) = PromptId::from_name(prompt_id) else {
        let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
        bail!(
            "Unknown prompt id '{}' (known: {})",
            prompt_id,
            known.join(", ")
        );
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    match &prompt.override_path {
        Some(path) => println!("# {} v{} from {}", id.as_str(), prompt.metadata.version, path.display()),
        None => println!("# {} v{} (builtin)", id.as_str(), prompt.metadata.version),
    }
    println!();
    println!("{}", prompt.content);

    Ok(())
}

/// Print the override directory and the file each prompt would be read from
pub fn cmd_prompts_path() -> Result<()> {
    let Some(dir) = default_prompts_dir() else {
        bail!("No local data directory on this system; prompt overrides are unavailable");
    };

    println!("{}", dir.display());
    if !dir.is_dir() {
        println!("  (directory does not exist yet)");
    }

    for (id, path, present) in override_files(&dir) {
        let marker = if present { "✓" } else { " " };
        println!("  [{}] {:<10} {}", marker, id.as_str(), path.display());
    }

    Ok(())
}

/// Expected override file for every built-in prompt and whether it exists
pub fn override_files(dir: &Path) -> Vec<(PromptId, PathBuf, bool)> {
    PromptId::all()
        .iter()
        .map(|&id| {
            let path = dir.join(id.override_file_name());
            let present = path.is_file();
            (id, path, present)
        })
        .collect()
}
