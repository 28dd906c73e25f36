//! Declarative (config-based) insights
//!
//! `analyze` = filter engine search → pure post-processing → [`InsightResult`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::ai::AIConfig;
use crate::error::{Error, Result};
use crate::filter::{FilterEngine, FilterResult, FilterSpec};

use super::engine::{check_cancelled, CancellationSignal, Insight};
use super::processors::PostProcessor;
use super::types::{InsightResult, ProgressReporter};

/// Insight defined by a filter spec and a post-processor
pub struct DeclarativeInsight {
    id: String,
    name: String,
    description: String,
    folder: Option<String>,
    filter: Arc<FilterSpec>,
    processor: Arc<dyn PostProcessor>,
    ai: AIConfig,
    engine: FilterEngine,
}

impl DeclarativeInsight {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        filter: FilterSpec,
        processor: Arc<dyn PostProcessor>,
        engine: FilterEngine,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            folder: None,
            filter: Arc::new(filter),
            processor,
            ai: AIConfig::default(),
            engine,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_folder(mut self, folder: Option<String>) -> Self {
        self.folder = folder;
        self
    }

    pub fn with_ai(mut self, ai: AIConfig) -> Self {
        self.ai = ai;
        self
    }

    pub fn filter(&self) -> &Arc<FilterSpec> {
        &self.filter
    }

    pub fn processor_name(&self) -> &str {
        self.processor.name()
    }

    /// Search file by file; a cancelled search stops its current file too
    async fn search(
        &self,
        files: &[PathBuf],
        cancel: &CancellationSignal,
        progress: &ProgressReporter,
    ) -> Result<FilterResult> {
        let filter = self.filter.compile()?;
        let total = files.len();
        let mut result = FilterResult::new();

        for (idx, path) in files.iter().enumerate() {
            check_cancelled(cancel)?;
            progress.report(
                idx,
                total,
                format!("Searching file {}/{}: {}", idx + 1, total, path.display()),
                Some(path.clone()),
            );

            let engine = self.engine.clone();
            let job_filter = filter.clone();
            let job_path = path.clone();
            let job_cancel = cancel.clone();
            let task = tokio::task::spawn_blocking(move || {
                engine.search_file_until(&job_filter, &job_path, &job_cancel)
            });

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                joined = task => joined?,
            };
            result.absorb(outcome);
        }

        progress.report(total, total, "Search complete", None);
        Ok(result)
    }
}

#[async_trait]
impl Insight for DeclarativeInsight {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    fn ai_config(&self) -> AIConfig {
        self.ai.clone()
    }

    async fn analyze(
        &self,
        files: &[PathBuf],
        cancel: &CancellationSignal,
        progress: &ProgressReporter,
    ) -> Result<InsightResult> {
        let filtered = self.search(files, cancel, progress).await?;

        // Filtering finished; a request that arrived meanwhile still wins
        check_cancelled(cancel)?;

        let processed = self.processor.process(&filtered);
        let mut metadata = processed.metadata;
        metadata.insert("total_files".into(), json!(files.len()));

        Ok(InsightResult::new(processed.result_type, processed.content)
            .with_metadata(metadata)
            .with_match_count(filtered.total_matches()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::{write_file, CRASH_LOG};
    use crate::filter::ReadingMode;
    use crate::insights::engine::execute;
    use crate::insights::processors::MatchReport;
    use crate::insights::types::{AnalysisOutcome, Progress};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn crash_insight(engine: FilterEngine) -> DeclarativeInsight {
        DeclarativeInsight::new(
            "android_crash",
            "Android Crash Detector",
            FilterSpec::new(r"FATAL\s+EXCEPTION").with_context(2),
            Arc::new(MatchReport),
            engine,
        )
    }

    #[tokio::test]
    async fn test_analyze_counts_matches() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_file(&dir, "a.log", CRASH_LOG),
            write_file(&dir, "b.log", "quiet\n"),
        ];

        let insight = crash_insight(FilterEngine::direct_only());
        let outcome = execute(
            &insight,
            &files,
            &CancellationSignal::new(),
            &ProgressReporter::silent(),
        )
        .await;

        let result = outcome.into_result().unwrap();
        assert_eq!(result.match_count, Some(1));
        assert!(result.content.contains("FATAL EXCEPTION: main"));
        let metadata = result.metadata.as_ref().unwrap();
        assert_eq!(metadata["total_files"], 2);
    }

    #[tokio::test]
    async fn test_progress_reports_per_file() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_file(&dir, "a.log", CRASH_LOG),
            write_file(&dir, "b.log", CRASH_LOG),
        ];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = ProgressReporter::new(Arc::new(move |p: &Progress| {
            sink.lock().unwrap().push((p.current, p.total));
        }));

        let insight = crash_insight(FilterEngine::direct_only());
        insight
            .analyze(&files, &CancellationSignal::new(), &progress)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_cancel_between_files() {
        let dir = TempDir::new().unwrap();
        let files: Vec<_> = (0..4)
            .map(|i| write_file(&dir, &format!("{i}.log"), CRASH_LOG))
            .collect();

        let cancel = CancellationSignal::new();
        let trigger = cancel.clone();
        // Cancel as soon as the second file starts
        let progress = ProgressReporter::new(Arc::new(move |p: &Progress| {
            if p.current == 1 {
                trigger.cancel();
            }
        }));

        let insight = crash_insight(FilterEngine::direct_only());
        let outcome = execute(&insight, &files, &cancel, &progress).await;
        assert!(matches!(outcome, AnalysisOutcome::Cancelled));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_stops_external_search_process() {
        use crate::filter::ExternalSearcher;
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let dir = TempDir::new().unwrap();
        let log = write_file(&dir, "a.log", CRASH_LOG);
        let binary = dir.path().join("stalled-search");
        std::fs::write(
            &binary,
            "#!/bin/sh\necho $$ > \"$(dirname \"$0\")/search.pid\"\nexec sleep 30\n",
        )
        .unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        let pid_file = dir.path().join("search.pid");

        let insight = crash_insight(FilterEngine::with_external(ExternalSearcher::new(&binary)));
        let cancel = CancellationSignal::new();
        let trigger = cancel.clone();
        let watched_pid = pid_file.clone();
        tokio::spawn(async move {
            while std::fs::read_to_string(&watched_pid)
                .map(|s| s.trim().is_empty())
                .unwrap_or(true)
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            trigger.cancel();
        });

        let outcome = execute(&insight, &[log], &cancel, &ProgressReporter::silent()).await;
        assert!(matches!(outcome, AnalysisOutcome::Cancelled));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut alive = true;
        while alive && Instant::now() < deadline {
            alive = std::process::Command::new("kill")
                .args(["-0", &pid])
                .stderr(std::process::Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if alive {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }
        assert!(!alive, "search process {pid} outlived cancellation");
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails() {
        let insight = DeclarativeInsight::new(
            "broken",
            "Broken",
            FilterSpec::new("[unterminated").with_reading_mode(ReadingMode::Direct),
            Arc::new(MatchReport),
            FilterEngine::direct_only(),
        );
        let outcome = execute(
            &insight,
            &[PathBuf::from("unused.log")],
            &CancellationSignal::new(),
            &ProgressReporter::silent(),
        )
        .await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed(Error::PatternCompile { .. })
        ));
    }
}
