//! Android Crash Analyzer
//!
//! Procedural insight that finds `FATAL EXCEPTION` crashes in Android logs and
//! keeps ten lines of stack trace after each one. AI follow-up is enabled and
//! automatic, with a crash-specific prompt.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Map};

use crate::ai::AIConfig;
use crate::error::Result;
use crate::filter::{FilterEngine, FilterSpec, MatchRecord};

use super::engine::{check_cancelled, CancellationSignal, Insight};
use super::types::{InsightResult, ProgressReporter};

/// Catalog name for definition files (`implementation: android_crash_analyzer`)
pub const IMPLEMENTATION: &str = "android_crash_analyzer";

const CRASH_PATTERN: &str = r"FATAL\s+EXCEPTION";
const STACK_LINES: usize = 10;

const CRASH_PROMPT: &str = "You are an experienced Android engineer reviewing crash logs.

For the crashes below, report:

1. Root cause of each crash, in plain terms
2. Components involved (activities, services, libraries)
3. Severity: Critical, High, Medium or Low
4. A concrete fix for each crash
5. How to keep the same class of crash from coming back

Keep it short and lead with the most severe crash.

{result_content}";

/// Crashes found in one file
struct FileCrashes {
    path: PathBuf,
    crashes: Vec<MatchRecord>,
}

pub struct AndroidCrashAnalyzer {
    engine: FilterEngine,
}

impl AndroidCrashAnalyzer {
    pub fn new(engine: FilterEngine) -> Self {
        Self { engine }
    }

    fn format_results(&self, found: &[FileCrashes], total_crashes: usize) -> String {
        let rule = "=".repeat(80);
        let mut content = format!("Android Crash Analysis\n{}\n\n", rule);

        if total_crashes == 0 {
            content.push_str("No FATAL EXCEPTION crashes found.\n");
            return content;
        }

        content.push_str(&format!("Total Crashes: {}\n", total_crashes));
        content.push_str(&format!("Files with Crashes: {}\n\n", found.len()));

        let mut number = 1;
        for file in found {
            let label = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            content.push_str(&format!("{}\n", rule));
            content.push_str(&format!("File: {}\n", label));
            content.push_str(&format!("Path: {}\n", file.path.display()));
            content.push_str(&format!("Crashes Found: {}\n", file.crashes.len()));
            content.push_str(&format!("{}\n\n", rule));

            for crash in &file.crashes {
                content.push_str(&format!("--- Crash #{} ---\n", number));
                content.push_str(&crash.line);
                content.push('\n');
                for line in &crash.context {
                    content.push_str(line);
                    content.push('\n');
                }
                content.push('\n');
                number += 1;
            }
        }

        content
    }
}

#[async_trait]
impl Insight for AndroidCrashAnalyzer {
    fn id(&self) -> &str {
        IMPLEMENTATION
    }

    fn name(&self) -> &str {
        "Android Crash Analyzer"
    }

    fn description(&self) -> &str {
        "Detects FATAL EXCEPTION crashes with stack traces and AI-powered analysis"
    }

    fn folder(&self) -> Option<&str> {
        Some("android")
    }

    fn ai_config(&self) -> AIConfig {
        AIConfig::custom(CRASH_PROMPT)
    }

    async fn analyze(
        &self,
        files: &[PathBuf],
        cancel: &CancellationSignal,
        progress: &ProgressReporter,
    ) -> Result<InsightResult> {
        let filter = FilterSpec::new(CRASH_PATTERN)
            .with_context(STACK_LINES)
            .compile()?;
        let total = files.len();
        let mut found = Vec::new();
        let mut total_crashes = 0;

        tracing::info!(files = total, "AndroidCrashAnalyzer: starting analysis");

        for (idx, path) in files.iter().enumerate() {
            check_cancelled(cancel)?;
            progress.report(
                idx,
                total,
                format!("Analyzing file {}/{}", idx + 1, total),
                Some(path.clone()),
            );

            let engine = self.engine.clone();
            let job_filter = filter.clone();
            let job_path = path.clone();
            let job_cancel = cancel.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                engine.search_file_until(&job_filter, &job_path, &job_cancel)
            })
            .await?;
            check_cancelled(cancel)?;

            match outcome.result {
                Ok(crashes) if !crashes.is_empty() => {
                    tracing::info!(path = %path.display(), crashes = crashes.len(), "Found crashes");
                    total_crashes += crashes.len();
                    found.push(FileCrashes {
                        path: path.clone(),
                        crashes,
                    });
                }
                Ok(_) => tracing::debug!(path = %path.display(), "No crashes found"),
                Err(e) => tracing::error!(path = %path.display(), error = %e, "Error processing file"),
            }
        }
        check_cancelled(cancel)?;
        progress.report(total, total, "Analysis complete", None);

        let mut metadata = Map::new();
        metadata.insert("total_crashes".into(), json!(total_crashes));
        metadata.insert("files_with_crashes".into(), json!(found.len()));
        metadata.insert("total_files".into(), json!(total));

        Ok(InsightResult::text(self.format_results(&found, total_crashes))
            .with_metadata(metadata)
            .with_match_count(total_crashes))
    }
}
