//! Insight Execution Model
//!
//! Every insight exposes the same capability set: `id`, `name`,
//! `description` and an async, cancellable `analyze`. Two variants exist:
//!
//! - **Declarative** - a filter spec plus a pure post-processor
//! - **Procedural** - author-written Rust registered in the [`InsightCatalog`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loglens_core::insights::{execute, CancellationSignal, ProgressReporter};
//!
//! let cancel = CancellationSignal::new();
//! let outcome = execute(insight.as_ref(), &files, &cancel, &ProgressReporter::silent()).await;
//! ```

pub mod android_crash;
pub mod catalog;
pub mod declarative;
pub mod engine;
pub mod processors;
pub mod types;

pub use android_crash::AndroidCrashAnalyzer;
pub use catalog::{InsightCatalog, InsightFactory};
pub use declarative::DeclarativeInsight;
pub use engine::{check_cancelled, execute, CancellationSignal, Insight};
pub use processors::{
    JsonProcessor, MatchReport, MatchSummary, PostProcessor, Processed, DEFAULT_PROCESSOR,
};
pub use types::{
    AnalysisOutcome, InsightResult, Progress, ProgressCallback, ProgressReporter, ResultType,
};
