//! The insight capability trait and the cancellable execution wrapper

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ai::AIConfig;
use crate::error::{Error, Result};

use super::types::{AnalysisOutcome, InsightResult, ProgressReporter};

/// Cooperative, monotonic cancellation for one `analyze` invocation
pub type CancellationSignal = CancellationToken;

/// Trait for insight analyzers (declarative and procedural alike)
///
/// `analyze` must check `cancel` at least once per file and return
/// [`Error::Cancelled`] once it observes a request.
#[async_trait]
pub trait Insight: Send + Sync {
    /// Unique identifier within a registry
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Optional grouping label for hosts
    fn folder(&self) -> Option<&str> {
        None
    }

    /// AI follow-up configuration when the definition file does not override it
    fn ai_config(&self) -> AIConfig {
        AIConfig::default()
    }

    /// Analyze the given files
    async fn analyze(
        &self,
        files: &[PathBuf],
        cancel: &CancellationSignal,
        progress: &ProgressReporter,
    ) -> Result<InsightResult>;
}

/// Run an insight to a terminal outcome
///
/// A run whose signal was cancelled is reported as `Cancelled` even if the
/// insight returned content, so "no matches" and "interrupted" never mix.
pub async fn execute(
    insight: &dyn Insight,
    files: &[PathBuf],
    cancel: &CancellationSignal,
    progress: &ProgressReporter,
) -> AnalysisOutcome {
    if cancel.is_cancelled() {
        return AnalysisOutcome::Cancelled;
    }

    tracing::debug!(insight = insight.id(), files = files.len(), "Starting analysis");

    match insight.analyze(files, cancel, progress).await {
        Ok(_) if cancel.is_cancelled() => {
            tracing::info!(insight = insight.id(), "Analysis cancelled");
            AnalysisOutcome::Cancelled
        }
        Ok(result) => {
            tracing::info!(
                insight = insight.id(),
                matches = ?result.match_count,
                "Insight analysis complete"
            );
            AnalysisOutcome::Completed(result)
        }
        Err(Error::Cancelled) => {
            tracing::info!(insight = insight.id(), "Analysis cancelled");
            AnalysisOutcome::Cancelled
        }
        Err(e) => {
            tracing::warn!(insight = insight.id(), error = %e, "Insight analysis failed");
            AnalysisOutcome::Failed(e)
        }
    }
}

/// Return `Cancelled` if the signal has been raised
pub fn check_cancelled(cancel: &CancellationSignal) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Procedural insight that counts files and cancels itself partway through
    struct CountingInsight {
        cancel_after: Option<usize>,
        ignore_cancel: bool,
    }

    #[async_trait]
    impl Insight for CountingInsight {
        fn id(&self) -> &str {
            "counting"
        }

        fn name(&self) -> &str {
            "Counting"
        }

        fn description(&self) -> &str {
            "Counts files"
        }

        async fn analyze(
            &self,
            files: &[PathBuf],
            cancel: &CancellationSignal,
            progress: &ProgressReporter,
        ) -> Result<InsightResult> {
            for (idx, file) in files.iter().enumerate() {
                if !self.ignore_cancel {
                    check_cancelled(cancel)?;
                }
                progress.report(idx, files.len(), "counting", Some(file.clone()));
                if self.cancel_after == Some(idx + 1) {
                    cancel.cancel();
                }
                tokio::task::yield_now().await;
            }
            Ok(InsightResult::text(format!("{} files", files.len())))
        }
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("{i}.log"))).collect()
    }

    #[tokio::test]
    async fn test_completed() {
        let insight = CountingInsight {
            cancel_after: None,
            ignore_cancel: false,
        };
        let outcome = execute(
            &insight,
            &files(3),
            &CancellationToken::new(),
            &ProgressReporter::silent(),
        )
        .await;
        assert_eq!(outcome.into_result().unwrap().content, "3 files");
    }

    #[tokio::test]
    async fn test_cancelled_mid_run() {
        let insight = CountingInsight {
            cancel_after: Some(1),
            ignore_cancel: false,
        };
        let outcome = execute(
            &insight,
            &files(5),
            &CancellationToken::new(),
            &ProgressReporter::silent(),
        )
        .await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_content_discarded_when_cancel_ignored() {
        let insight = CountingInsight {
            cancel_after: Some(2),
            ignore_cancel: true,
        };
        let outcome = execute(
            &insight,
            &files(4),
            &CancellationToken::new(),
            &ProgressReporter::silent(),
        )
        .await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_precancelled_never_runs() {
        let insight = CountingInsight {
            cancel_after: None,
            ignore_cancel: true,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = execute(&insight, &files(1), &cancel, &ProgressReporter::silent()).await;
        assert!(outcome.is_cancelled());
    }
}
