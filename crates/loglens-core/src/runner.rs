//! Standalone Runner
//!
//! One-shot driver for developing an insight outside a host: load a single
//! definition with the registry's validation rules (without publishing it),
//! run it over the given files, print the content.
//!
//! Exit codes: 0 success, 1 load error, 2 analysis failure or cancellation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::ai::{AiDispatcher, AiNarrative, AiTrigger, TriggerOutcome};
use crate::filter::FilterEngine;
use crate::insights::{
    execute, AnalysisOutcome, CancellationSignal, InsightCatalog, Progress, ProgressReporter,
};
use crate::prompts::PromptLibrary;
use crate::registry::load_definition;

/// How a standalone run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    LoadFailed,
    AnalysisFailed,
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::LoadFailed => 1,
            RunStatus::AnalysisFailed | RunStatus::Cancelled => 2,
        }
    }
}

pub struct StandaloneRunner {
    catalog: InsightCatalog,
    engine: FilterEngine,
    ai: Option<(Arc<dyn AiDispatcher>, AiTrigger)>,
}

impl StandaloneRunner {
    pub fn new(catalog: InsightCatalog, engine: FilterEngine) -> Self {
        Self {
            catalog,
            engine,
            ai: None,
        }
    }

    /// Dispatch the automatic AI follow-up through `dispatcher` after a run
    pub fn with_ai(mut self, dispatcher: Arc<dyn AiDispatcher>, prompts: PromptLibrary) -> Self {
        self.ai = Some((dispatcher, AiTrigger::with_prompts(prompts)));
        self
    }

    /// Run one definition over `files`
    ///
    /// Progress and content go to `out`, diagnostics to `err`. Returns once
    /// the analysis has completed, failed, or been cancelled.
    pub async fn run<W>(
        &self,
        definition: &Path,
        files: &[PathBuf],
        out: Arc<Mutex<W>>,
        err: &mut dyn Write,
    ) -> RunStatus
    where
        W: Write + Send + 'static,
    {
        let descriptor = match load_definition(definition, &self.catalog, &self.engine) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                let _ = writeln!(err, "Error: failed to load insight: {}", e);
                return RunStatus::LoadFailed;
            }
        };

        info!(insight = %descriptor.id, files = files.len(), "Running insight");

        let sink = out.clone();
        let progress = ProgressReporter::new(Arc::new(move |p: &Progress| {
            if let Ok(mut out) = sink.lock() {
                let _ = writeln!(out, "[{}/{}] {}", p.current, p.total, p.message);
            }
        }));

        // No cancellation source is wired up for a standalone run
        let cancel = CancellationSignal::new();
        let outcome = execute(descriptor.insight.as_ref(), files, &cancel, &progress).await;

        let result = match outcome {
            AnalysisOutcome::Completed(result) => result,
            AnalysisOutcome::Failed(e) => {
                let _ = writeln!(err, "Error: analysis failed: {}", e);
                return RunStatus::AnalysisFailed;
            }
            AnalysisOutcome::Cancelled => {
                let _ = writeln!(err, "Analysis cancelled");
                return RunStatus::Cancelled;
            }
        };

        if let Some((dispatcher, trigger)) = &self.ai {
            match trigger
                .run_auto(dispatcher.as_ref(), &result, &descriptor.ai, Some(&descriptor.id))
                .await
            {
                Ok(TriggerOutcome::NotTriggered) => {
                    info!(insight = %descriptor.id, "AI follow-up not triggered");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(insight = %descriptor.id, error = %e, "Could not build AI request");
                    let _ = writeln!(err, "Warning: AI follow-up skipped: {}", e);
                }
            }
        }

        if let Ok(mut out) = out.lock() {
            let _ = write!(out, "\n{}", result.content);
            if !result.content.ends_with('\n') {
                let _ = writeln!(out);
            }
            match result.narrative() {
                Some(AiNarrative::Text(text)) => {
                    let _ = writeln!(out, "\n=== AI Analysis ===\n{}", text);
                }
                Some(AiNarrative::Error(message)) => {
                    let _ = writeln!(err, "Warning: AI analysis failed: {}", message);
                }
                None => {}
            }
            let _ = out.flush();
        }

        RunStatus::Success
    }
}
