//! Loglens Core Library
//!
//! Shared functionality for the loglens log-insight engine:
//! - Filter engine with an external search fast path and a direct fallback
//! - Insight contract, cancellation and progress plumbing
//! - Declarative and procedural insights with pluggable post-processors
//! - Insight registry with hot reload from definition directories
//! - AI follow-up trigger with pluggable dispatchers (Ollama, mock)
//! - Prompt library for customizable AI prompts
//! - Standalone runner for developing a single insight

pub mod ai;
pub mod config;
pub mod error;
pub mod filter;
pub mod insights;
pub mod prompts;
pub mod registry;
pub mod runner;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIClient, AIConfig, AiDispatcher, AiNarrative, AiRequest, AiTrigger, MockDispatcher,
    OllamaDispatcher, PromptType, TriggerOutcome,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use filter::{
    FileError, FileErrorKind, FilterEngine, FilterResult, FilterSpec, FilterWarning, MatchRecord,
    ReadingMode,
};
pub use insights::{
    execute, AnalysisOutcome, CancellationSignal, Insight, InsightCatalog, InsightResult,
    PostProcessor, Progress, ProgressReporter, ResultType,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use registry::{
    InsightDescriptor, InsightKind, InsightRegistry, LoadError, LoadErrorKind, RegistrySnapshot,
    RegistryWatcher, ReloadReport, WatchHandle,
};
pub use runner::{RunStatus, StandaloneRunner};
