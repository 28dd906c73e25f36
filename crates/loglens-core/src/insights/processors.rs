//! Post-processors for declarative insights
//!
//! A post-processor turns a [`FilterResult`] into displayable content. It is
//! pure: it sees only the filter result and never touches the file system.

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::filter::FilterResult;

use super::types::ResultType;

/// Name of the processor used when a definition does not pick one
pub const DEFAULT_PROCESSOR: &str = "match_report";

const RULE_WIDTH: usize = 80;

/// Content and metadata produced from a filter result
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub result_type: ResultType,
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// Pure transformation from filter output to insight content
pub trait PostProcessor: Send + Sync {
    /// Name used by definition files (`output.processor`)
    fn name(&self) -> &str;

    fn process(&self, result: &FilterResult) -> Processed;
}

/// Counts shared by every built-in processor
fn base_metadata(result: &FilterResult) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("total_matches".into(), json!(result.total_matches()));
    metadata.insert("files_with_matches".into(), json!(result.file_count()));
    metadata.insert("files_skipped".into(), json!(result.errors.len()));
    metadata.insert("fallback_warnings".into(), json!(result.warnings.len()));
    metadata
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Per-file sections with every match and its context
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchReport;

impl PostProcessor for MatchReport {
    fn name(&self) -> &str {
        "match_report"
    }

    fn process(&self, result: &FilterResult) -> Processed {
        let rule = "=".repeat(RULE_WIDTH);
        let mut content = String::new();

        if result.is_empty() {
            content.push_str("No matches found.\n");
        } else {
            content.push_str(&format!("Total Matches: {}\n", result.total_matches()));
            content.push_str(&format!("Files with Matches: {}\n\n", result.file_count()));

            let mut number = 1;
            for (path, matches) in result.files() {
                content.push_str(&format!("{}\n", rule));
                content.push_str(&format!("File: {}\n", file_label(path)));
                content.push_str(&format!("Path: {}\n", path.display()));
                content.push_str(&format!("Matches Found: {}\n", matches.len()));
                content.push_str(&format!("{}\n\n", rule));

                for record in matches {
                    content.push_str(&format!(
                        "--- Match #{} (line {}) ---\n",
                        number, record.line_number
                    ));
                    content.push_str(&record.line);
                    content.push('\n');
                    for line in &record.context {
                        content.push_str(line);
                        content.push('\n');
                    }
                    content.push('\n');
                    number += 1;
                }
            }
        }

        if !result.errors.is_empty() {
            content.push_str("Skipped files:\n");
            for err in &result.errors {
                content.push_str(&format!("  {}\n", err));
            }
        }

        Processed {
            result_type: ResultType::Text,
            content,
            metadata: base_metadata(result),
        }
    }
}

/// One line per file with its match count
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchSummary;

impl PostProcessor for MatchSummary {
    fn name(&self) -> &str {
        "match_summary"
    }

    fn process(&self, result: &FilterResult) -> Processed {
        let content = if result.is_empty() {
            "No matches found.\n".to_string()
        } else {
            let mut content = String::new();
            for (path, matches) in result.files() {
                let noun = if matches.len() == 1 { "match" } else { "matches" };
                content.push_str(&format!("{}: {} {}\n", path.display(), matches.len(), noun));
            }
            content.push_str(&format!("Total: {}\n", result.total_matches()));
            content
        };

        Processed {
            result_type: ResultType::Text,
            content,
            metadata: base_metadata(result),
        }
    }
}

/// The whole filter result as pretty JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProcessor;

impl PostProcessor for JsonProcessor {
    fn name(&self) -> &str {
        "json"
    }

    fn process(&self, result: &FilterResult) -> Processed {
        let content = serde_json::to_string_pretty(result).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to serialize filter result");
            "{}".to_string()
        });
        Processed {
            result_type: ResultType::Structured,
            content,
            metadata: base_metadata(result),
        }
    }
}
