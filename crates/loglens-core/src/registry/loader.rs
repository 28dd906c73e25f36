//! Definition discovery and validation
//!
//! Candidate files are `*.yaml` / `*.yml` under the configured directories,
//! walked recursively in file-name order with hidden entries skipped. Each
//! file holds one insight:
//!
//! ```yaml
//! # declarative
//! metadata: { id: android_crash, name: Android Crash Detector }
//! filters:  { line_pattern: 'FATAL\s+EXCEPTION', context_lines_after: 10 }
//! ai:       { enabled: true, auto: true, prompt_type: explain }
//!
//! # procedural
//! implementation: android_crash_analyzer
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::ai::AIConfig;
use crate::filter::{FilterEngine, FilterSpec, ReadingMode};
use crate::insights::{DeclarativeInsight, Insight, InsightCatalog, DEFAULT_PROCESSOR};

use super::{InsightDescriptor, InsightKind, RegistrySnapshot};

/// Why a definition file was not published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    /// Unreadable YAML, wrong types, or no recognized descriptor
    Parse,
    MissingField,
    /// Another definition earlier in the walk already owns the id
    DuplicateId,
    UnknownImplementation,
    InvalidField,
    Io,
}

impl LoadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse_error",
            Self::MissingField => "missing_field",
            Self::DuplicateId => "duplicate_id",
            Self::UnknownImplementation => "unknown_implementation",
            Self::InvalidField => "invalid_field",
            Self::Io => "io_error",
        }
    }
}

/// A non-fatal load failure, scoped to one definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub path: PathBuf,
    pub kind: LoadErrorKind,
    pub message: String,
}

impl LoadError {
    pub fn new(path: &Path, kind: LoadErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.path.display(),
            self.kind.as_str(),
            self.message
        )
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Deserialize)]
struct DeclarativeDoc {
    metadata: Option<MetadataDoc>,
    filters: Option<FiltersDoc>,
    output: Option<OutputDoc>,
    ai: Option<AIConfig>,
}

#[derive(Debug, Deserialize)]
struct MetadataDoc {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FiltersDoc {
    #[serde(alias = "linePattern")]
    line_pattern: Option<String>,
    #[serde(alias = "readingMode")]
    reading_mode: Option<ReadingMode>,
    #[serde(alias = "contextLinesAfter")]
    context_lines_after: Option<i64>,
    #[serde(alias = "caseSensitive")]
    case_sensitive: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OutputDoc {
    processor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProceduralDoc {
    implementation: String,
    ai: Option<AIConfig>,
}

/// Whether a path looks like a definition file
pub fn is_definition_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    let yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    !hidden && yaml
}

/// Whether `path` sits under a hidden entry below one of `roots`
///
/// Components above the root are not considered, so a root that is itself
/// inside a dot-directory still counts as visible.
pub fn is_hidden_under(path: &Path, roots: &[PathBuf]) -> bool {
    roots
        .iter()
        .filter_map(|root| path.strip_prefix(root).ok())
        .any(|rel| {
            rel.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false)
            })
        })
}

/// Every candidate definition file, in walk order
pub fn discover(directories: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in directories {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Insight directory not found, skipping");
            continue;
        }
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .map(|n| n.starts_with('.'))
                        .unwrap_or(false)
            });
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_definition_file(entry.path()) => {
                    found.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "Error walking insight directory"),
            }
        }
    }
    found
}

/// Load and validate every definition under `directories`
///
/// The first definition to claim an id wins; later ones are reported as
/// `DuplicateId` and never published.
pub fn load_all(
    directories: &[PathBuf],
    catalog: &InsightCatalog,
    engine: &FilterEngine,
) -> (RegistrySnapshot, Vec<LoadError>) {
    let mut snapshot = RegistrySnapshot::default();
    let mut errors = Vec::new();

    for path in discover(directories) {
        match load_definition(&path, catalog, engine) {
            Ok(descriptor) => {
                if let Some(existing) = snapshot.get(&descriptor.id) {
                    let message = format!(
                        "id '{}' is already defined by {}",
                        descriptor.id,
                        existing.source.display()
                    );
                    warn!(path = %path.display(), id = %descriptor.id, "Duplicate insight id");
                    errors.push(LoadError::new(&path, LoadErrorKind::DuplicateId, message));
                    continue;
                }
                debug!(path = %path.display(), id = %descriptor.id, "Loaded insight");
                snapshot.insert(Arc::new(descriptor));
            }
            Err(err) => {
                warn!(path = %err.path.display(), kind = err.kind.as_str(), error = %err.message, "Failed to load insight");
                errors.push(err);
            }
        }
    }

    info!(
        insights = snapshot.len(),
        errors = errors.len(),
        "Insight scan complete"
    );
    (snapshot, errors)
}

/// Load one definition file without publishing it anywhere
pub fn load_definition(
    path: &Path,
    catalog: &InsightCatalog,
    engine: &FilterEngine,
) -> Result<InsightDescriptor, LoadError> {
    let content = fs::read_to_string(path)
        .map_err(|e| LoadError::new(path, LoadErrorKind::Io, e.to_string()))?;

    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| LoadError::new(path, LoadErrorKind::Parse, e.to_string()))?;

    let has_key = |key: &str| value.as_mapping().is_some_and(|m| m.contains_key(key));

    if has_key("metadata") || has_key("filters") {
        let doc: DeclarativeDoc = serde_yaml::from_value(value)
            .map_err(|e| LoadError::new(path, LoadErrorKind::Parse, e.to_string()))?;
        load_declarative(path, doc, catalog, engine)
    } else if has_key("implementation") {
        let doc: ProceduralDoc = serde_yaml::from_value(value)
            .map_err(|e| LoadError::new(path, LoadErrorKind::Parse, e.to_string()))?;
        load_procedural(path, doc, catalog, engine)
    } else {
        Err(LoadError::new(
            path,
            LoadErrorKind::Parse,
            "no recognized insight descriptor (expected `metadata`/`filters` or `implementation`)",
        ))
    }
}

fn required(path: &Path, value: Option<String>, field: &str) -> Result<String, LoadError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(LoadError::new(
            path,
            LoadErrorKind::MissingField,
            format!("{} is required", field),
        )),
    }
}

fn validate_ai(path: &Path, ai: &AIConfig) -> Result<(), LoadError> {
    ai.validate()
        .map_err(|message| LoadError::new(path, LoadErrorKind::InvalidField, message))
}

fn load_declarative(
    path: &Path,
    doc: DeclarativeDoc,
    catalog: &InsightCatalog,
    engine: &FilterEngine,
) -> Result<InsightDescriptor, LoadError> {
    let metadata = doc.metadata.ok_or_else(|| {
        LoadError::new(path, LoadErrorKind::MissingField, "metadata is required")
    })?;
    let id = required(path, metadata.id, "metadata.id")?;
    let name = required(path, metadata.name, "metadata.name")?;

    let filters = doc
        .filters
        .ok_or_else(|| LoadError::new(path, LoadErrorKind::MissingField, "filters is required"))?;
    let pattern = filters
        .line_pattern
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            LoadError::new(
                path,
                LoadErrorKind::MissingField,
                "filters.line_pattern is required",
            )
        })?;
    let context = filters.context_lines_after.unwrap_or(0);
    if context < 0 {
        return Err(LoadError::new(
            path,
            LoadErrorKind::InvalidField,
            format!("filters.context_lines_after must not be negative (got {})", context),
        ));
    }

    let spec = FilterSpec::new(pattern)
        .with_reading_mode(filters.reading_mode.unwrap_or_default())
        .with_context(context as usize)
        .case_sensitive(filters.case_sensitive.unwrap_or(false));

    let processor_name = doc
        .output
        .and_then(|o| o.processor)
        .unwrap_or_else(|| DEFAULT_PROCESSOR.to_string());
    let processor = catalog.processor(&processor_name).ok_or_else(|| {
        LoadError::new(
            path,
            LoadErrorKind::InvalidField,
            format!(
                "unknown output.processor '{}' (known: {})",
                processor_name,
                catalog.processor_names().join(", ")
            ),
        )
    })?;

    let ai = doc.ai.unwrap_or_default();
    validate_ai(path, &ai)?;

    let description = metadata.description.unwrap_or_default();
    let insight = DeclarativeInsight::new(id.clone(), name.clone(), spec, processor, engine.clone())
        .with_description(description.clone())
        .with_folder(metadata.folder.clone())
        .with_ai(ai.clone());
    let filter = insight.filter().clone();

    Ok(InsightDescriptor {
        id,
        name,
        description,
        kind: InsightKind::Declarative,
        source: path.to_path_buf(),
        folder: metadata.folder,
        filter: Some(filter),
        ai,
        loaded_at: Utc::now(),
        insight: Arc::new(insight),
    })
}

fn load_procedural(
    path: &Path,
    doc: ProceduralDoc,
    catalog: &InsightCatalog,
    engine: &FilterEngine,
) -> Result<InsightDescriptor, LoadError> {
    let factory = catalog.implementation(&doc.implementation).ok_or_else(|| {
        LoadError::new(
            path,
            LoadErrorKind::UnknownImplementation,
            format!(
                "no implementation named '{}' (known: {})",
                doc.implementation,
                catalog.implementation_names().join(", ")
            ),
        )
    })?;
    let insight: Arc<dyn Insight> = factory(engine);

    let id = required(path, Some(insight.id().to_string()), "id")?;
    let name = required(path, Some(insight.name().to_string()), "name")?;
    let ai = doc.ai.unwrap_or_else(|| insight.ai_config());
    validate_ai(path, &ai)?;

    Ok(InsightDescriptor {
        id,
        name,
        description: insight.description().to_string(),
        kind: InsightKind::Procedural,
        source: path.to_path_buf(),
        folder: insight.folder().map(str::to_string),
        filter: None,
        ai,
        loaded_at: Utc::now(),
        insight,
    })
}
