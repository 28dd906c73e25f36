//! Filter Engine - pattern search over log files with context capture
//!
//! Two line searchers implement the same operation:
//!
//! - **fast-external**: ripgrep as a subprocess, one invocation per file
//! - **direct**: a sequential in-process scan with the `regex` crate
//!
//! The external searcher is selected by a runtime probe for the binary. Whenever
//! it cannot run (missing binary, non-zero exit, unparseable output) the direct
//! searcher is used for that file and a warning is recorded on the result.
//!
//! Both searchers only produce matching line numbers. The matched text and the
//! following context lines always come from [`reader::capture`], so the output
//! shape is identical whichever path found the match.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loglens_core::filter::{FilterEngine, FilterSpec};
//!
//! let engine = FilterEngine::probe();
//! let spec = FilterSpec::new(r"FATAL\s+EXCEPTION").with_context(2);
//! let result = engine.search(&spec, &files)?;
//! println!("{} matches", result.total_matches());
//! ```

mod direct;
mod reader;
mod ripgrep;

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub use direct::DirectSearcher;
pub use ripgrep::ExternalSearcher;

/// Default external search binary
pub const DEFAULT_SEARCH_BINARY: &str = "rg";

/// Which search path a filter prefers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingMode {
    /// External search utility, falling back to direct when it cannot run
    #[default]
    #[serde(alias = "ripgrep", alias = "fast-external", alias = "fastExternal")]
    FastExternal,
    /// In-process sequential scan only
    Direct,
}

impl ReadingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingMode::FastExternal => "fast_external",
            ReadingMode::Direct => "direct",
        }
    }
}

impl fmt::Display for ReadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative filter specification
///
/// Immutable once the owning descriptor is published; edits arrive as a new
/// descriptor through reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Regular expression matched against each line
    #[serde(alias = "linePattern")]
    pub line_pattern: String,
    #[serde(default, alias = "readingMode")]
    pub reading_mode: ReadingMode,
    /// Number of lines captured after each match
    #[serde(default, alias = "contextLinesAfter")]
    pub context_lines_after: usize,
    #[serde(default, alias = "caseSensitive")]
    pub case_sensitive: bool,
}

impl FilterSpec {
    /// Create a case-insensitive spec with no context that prefers the external path
    pub fn new(line_pattern: impl Into<String>) -> Self {
        Self {
            line_pattern: line_pattern.into(),
            reading_mode: ReadingMode::FastExternal,
            context_lines_after: 0,
            case_sensitive: false,
        }
    }

    pub fn with_context(mut self, lines: usize) -> Self {
        self.context_lines_after = lines;
        self
    }

    pub fn with_reading_mode(mut self, mode: ReadingMode) -> Self {
        self.reading_mode = mode;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Compile the line pattern for the direct path
    pub fn compile(&self) -> Result<CompiledFilter> {
        let regex = RegexBuilder::new(&self.line_pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|source| Error::PatternCompile {
                pattern: self.line_pattern.clone(),
                source,
            })?;
        Ok(CompiledFilter {
            spec: self.clone(),
            regex,
        })
    }
}

/// A filter spec with its pattern compiled, ready to run against files
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    spec: FilterSpec,
    regex: Regex,
}

impl CompiledFilter {
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn pattern(&self) -> &str {
        &self.spec.line_pattern
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// One matching line with the lines that follow it in the same file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: u64,
    pub line: String,
    /// Up to `context_lines_after` following lines, truncated at end of file
    pub context: Vec<String>,
}

/// Why a single file could not be searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    NotFound,
    PermissionDenied,
    /// Binary content (NUL byte in the leading block)
    Binary,
    Read,
    /// The search was cancelled before this file finished
    Cancelled,
}

/// A file-scoped failure; the rest of the search is unaffected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub(crate) fn from_io(path: &Path, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => FileErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => FileErrorKind::PermissionDenied,
            _ => FileErrorKind::Read,
        };
        Self {
            path: path.to_path_buf(),
            kind,
            message: err.to_string(),
        }
    }

    pub(crate) fn cancelled(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: FileErrorKind::Cancelled,
            message: "search cancelled".to_string(),
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Non-fatal notice recorded when the direct path replaced the external one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Grouped, ordered output of a search across files
///
/// Files appear in discovery order, matches in ascending line order. Only
/// files with at least one match get an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterResult {
    files: IndexMap<PathBuf, Vec<MatchRecord>>,
    pub warnings: Vec<FilterWarning>,
    pub errors: Vec<FileError>,
}

impl FilterResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_matches(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_matches() == 0
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Iterate (path, matches) in discovery order
    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &Vec<MatchRecord>)> {
        self.files.iter()
    }

    pub fn matches_for(&self, path: &Path) -> Option<&[MatchRecord]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// All records in file order, then line order
    pub fn records(&self) -> impl Iterator<Item = &MatchRecord> {
        self.files.values().flatten()
    }

    /// Fold a per-file outcome into this result
    pub fn absorb(&mut self, outcome: FileSearch) {
        if let Some(warning) = outcome.warning {
            self.warnings.push(warning);
        }
        match outcome.result {
            Ok(matches) if !matches.is_empty() => {
                self.files
                    .entry(outcome.path)
                    .or_default()
                    .extend(matches);
            }
            Ok(_) => {}
            Err(err) => self.errors.push(err),
        }
    }
}

/// Outcome of searching a single file
#[derive(Debug, Clone)]
pub struct FileSearch {
    pub path: PathBuf,
    pub result: std::result::Result<Vec<MatchRecord>, FileError>,
    pub warning: Option<FilterWarning>,
    /// True when the external searcher produced the line numbers
    pub used_external: bool,
}

/// Failure of a line searcher
#[derive(Debug)]
pub enum SearchFailure {
    /// The search tool could not produce a usable answer; try the other path
    Tool(String),
    /// The file itself could not be read
    Io(std::io::Error),
    /// The cancellation signal fired; no fallback is attempted
    Cancelled,
}

/// One way of finding the line numbers that match a compiled filter
pub trait LineSearcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ascending, de-duplicated 1-based line numbers that match
    ///
    /// Returns [`SearchFailure::Cancelled`] soon after `cancel` fires.
    fn matching_lines(
        &self,
        path: &Path,
        filter: &CompiledFilter,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u64>, SearchFailure>;
}

/// Search engine holding the probed external searcher and the direct fallback
#[derive(Debug, Clone)]
pub struct FilterEngine {
    external: Option<ExternalSearcher>,
    /// False when the fast path is switched off, so no fallback is reported
    external_enabled: bool,
    direct: DirectSearcher,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::probe()
    }
}

impl FilterEngine {
    /// Probe PATH for the default external search binary
    pub fn probe() -> Self {
        Self::with_binary(DEFAULT_SEARCH_BINARY)
    }

    /// Probe PATH (or an explicit path) for a specific search binary
    pub fn with_binary(binary: &str) -> Self {
        let external = ExternalSearcher::locate(binary);
        match &external {
            Some(searcher) => debug!(binary = %searcher.binary().display(), "External search available"),
            None => debug!(binary, "External search binary not found, using direct search"),
        }
        Self {
            external,
            external_enabled: true,
            direct: DirectSearcher,
        }
    }

    /// Engine that never spawns a subprocess
    pub fn direct_only() -> Self {
        Self {
            external: None,
            external_enabled: false,
            direct: DirectSearcher,
        }
    }

    /// Engine with an explicit external searcher (no PATH probe)
    pub fn with_external(searcher: ExternalSearcher) -> Self {
        Self {
            external: Some(searcher),
            external_enabled: true,
            direct: DirectSearcher,
        }
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Search every file, returning partial results when individual files fail
    ///
    /// Only an invalid pattern fails the whole call.
    pub fn search(&self, spec: &FilterSpec, files: &[PathBuf]) -> Result<FilterResult> {
        let filter = spec.compile()?;
        let mut result = FilterResult::new();
        for path in files {
            result.absorb(self.search_file(&filter, path));
        }
        Ok(result)
    }

    /// Search a single file with an already compiled filter
    pub fn search_file(&self, filter: &CompiledFilter, path: &Path) -> FileSearch {
        self.search_file_until(filter, path, &CancellationToken::new())
    }

    /// [`search_file`](Self::search_file) that stops once `cancel` fires
    ///
    /// A running external search process is killed; the file then reports
    /// [`FileErrorKind::Cancelled`].
    pub fn search_file_until(
        &self,
        filter: &CompiledFilter,
        path: &Path,
        cancel: &CancellationToken,
    ) -> FileSearch {
        let mut outcome = FileSearch {
            path: path.to_path_buf(),
            result: Ok(Vec::new()),
            warning: None,
            used_external: false,
        };

        if let Err(err) = reader::probe(path) {
            debug!(path = %path.display(), error = %err, "Skipping unreadable file");
            outcome.result = Err(err);
            return outcome;
        }

        let lines = match self.matching_lines(filter, path, cancel, &mut outcome) {
            Ok(lines) => lines,
            Err(err) => {
                outcome.result = Err(err);
                return outcome;
            }
        };
        if cancel.is_cancelled() {
            outcome.result = Err(FileError::cancelled(path));
            return outcome;
        }

        outcome.result = reader::capture(path, &lines, filter.spec().context_lines_after)
            .map_err(|e| FileError::from_io(path, &e));
        outcome
    }

    fn matching_lines(
        &self,
        filter: &CompiledFilter,
        path: &Path,
        cancel: &CancellationToken,
        outcome: &mut FileSearch,
    ) -> std::result::Result<Vec<u64>, FileError> {
        if self.external_enabled && filter.spec().reading_mode == ReadingMode::FastExternal {
            let attempt = match &self.external {
                Some(external) => external.matching_lines(path, filter, cancel),
                None => Err(SearchFailure::Tool("external search binary not available".into())),
            };
            match attempt {
                Ok(lines) => {
                    outcome.used_external = true;
                    return Ok(lines);
                }
                Err(SearchFailure::Tool(reason)) => {
                    warn!(
                        path = %path.display(),
                        reason = %reason,
                        "External search unavailable, falling back to direct search"
                    );
                    outcome.warning = Some(FilterWarning {
                        path: path.to_path_buf(),
                        message: format!("direct search used: {}", reason),
                    });
                }
                Err(SearchFailure::Io(err)) => return Err(FileError::from_io(path, &err)),
                Err(SearchFailure::Cancelled) => return Err(FileError::cancelled(path)),
            }
        }

        match self.direct.matching_lines(path, filter, cancel) {
            Ok(lines) => Ok(lines),
            Err(SearchFailure::Io(err)) => Err(FileError::from_io(path, &err)),
            Err(SearchFailure::Cancelled) => Err(FileError::cancelled(path)),
            Err(SearchFailure::Tool(reason)) => Err(FileError {
                path: path.to_path_buf(),
                kind: FileErrorKind::Read,
                message: reason,
            }),
        }
    }
}
