//! Core types for insight execution

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize, Serializer};

use crate::ai::AiNarrative;
use crate::error::Error;

/// Shape of an insight's content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    #[default]
    Text,
    /// Machine-readable content (JSON)
    Structured,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Text => "text",
            ResultType::Structured => "structured",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of one completed `analyze` run
///
/// The narrative slot is written at most once. Share results behind an `Arc`
/// when handing them to the AI trigger.
#[derive(Debug, Serialize)]
pub struct InsightResult {
    pub result_type: ResultType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// Total filter matches for declarative insights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
    #[serde(rename = "ai_narrative", serialize_with = "serialize_narrative")]
    narrative: OnceLock<AiNarrative>,
    #[serde(skip)]
    ai_in_flight: AtomicBool,
}

fn serialize_narrative<S: Serializer>(
    slot: &OnceLock<AiNarrative>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    slot.get().serialize(serializer)
}

impl InsightResult {
    pub fn new(result_type: ResultType, content: impl Into<String>) -> Self {
        Self {
            result_type,
            content: content.into(),
            metadata: None,
            match_count: None,
            narrative: OnceLock::new(),
            ai_in_flight: AtomicBool::new(false),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(ResultType::Text, content)
    }

    pub fn structured(content: impl Into<String>) -> Self {
        Self::new(ResultType::Structured, content)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_match_count(mut self, count: usize) -> Self {
        self.match_count = Some(count);
        self
    }

    /// Whether the result carries something worth an automatic AI follow-up
    ///
    /// Results that carry a match count (every declarative result, and
    /// procedural ones whose author sets it) signal on that count; the rest
    /// on non-empty content.
    pub fn has_signal(&self) -> bool {
        match self.match_count {
            Some(count) => count > 0,
            None => !self.content.trim().is_empty(),
        }
    }

    pub fn narrative(&self) -> Option<&AiNarrative> {
        self.narrative.get()
    }

    /// Fill the narrative slot; false if it was already filled
    pub(crate) fn set_narrative(&self, narrative: AiNarrative) -> bool {
        self.narrative.set(narrative).is_ok()
    }

    /// Claim the single in-flight AI slot; false if a request is pending
    pub(crate) fn begin_ai_request(&self) -> bool {
        self.ai_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_ai_request(&self) {
        self.ai_in_flight.store(false, Ordering::Release);
    }

    pub fn ai_pending(&self) -> bool {
        self.ai_in_flight.load(Ordering::Acquire)
    }
}

/// Terminal state of an `analyze` invocation
#[derive(Debug)]
pub enum AnalysisOutcome {
    Completed(InsightResult),
    /// Cancellation was requested; no content is produced
    Cancelled,
    Failed(Error),
}

impl AnalysisOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisOutcome::Cancelled)
    }

    pub fn into_result(self) -> Option<InsightResult> {
        match self {
            AnalysisOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

/// A progress update from a running analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub message: String,
    pub path: Option<PathBuf>,
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Forwards progress to an optional observer, dropping regressions
///
/// Observers only ever see non-decreasing `current` values. Reporting never
/// affects the analysis itself.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    high_water: Arc<AtomicUsize>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            high_water: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reporter that discards every update
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(
        &self,
        current: usize,
        total: usize,
        message: impl Into<String>,
        path: Option<PathBuf>,
    ) {
        let Some(callback) = &self.callback else {
            return;
        };
        let previous = self.high_water.fetch_max(current, Ordering::AcqRel);
        if current < previous {
            return;
        }
        callback(&Progress {
            current,
            total,
            message: message.into(),
            path,
        });
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("observed", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_signal() {
        assert!(!InsightResult::text("summary").with_match_count(0).has_signal());
        assert!(InsightResult::text("").with_match_count(2).has_signal());
        assert!(InsightResult::text("found things").has_signal());
        assert!(!InsightResult::text("  \n").has_signal());
    }

    #[test]
    fn test_narrative_written_once() {
        let result = InsightResult::text("x");
        assert!(result.set_narrative(AiNarrative::Text("first".into())));
        assert!(!result.set_narrative(AiNarrative::Text("second".into())));
        assert_eq!(result.narrative().unwrap().as_text(), "first");
    }

    #[test]
    fn test_single_in_flight_slot() {
        let result = InsightResult::text("x");
        assert!(result.begin_ai_request());
        assert!(!result.begin_ai_request());
        result.end_ai_request();
        assert!(result.begin_ai_request());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |p: &Progress| {
            sink.lock().unwrap().push(p.current);
        }));

        reporter.report(1, 3, "a", None);
        reporter.report(3, 3, "c", None);
        reporter.report(2, 3, "late", None);
        reporter.report(3, 3, "done", None);

        assert_eq!(*seen.lock().unwrap(), vec![1, 3, 3]);
    }

    #[test]
    fn test_result_serializes_narrative() {
        let result = InsightResult::text("body").with_match_count(1);
        result.set_narrative(AiNarrative::Text("story".into()));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"], "body");
        assert_eq!(json["ai_narrative"]["status"], "text");
        assert_eq!(json["ai_narrative"]["text"], "story");
        assert!(json.get("ai_in_flight").is_none());
    }
}
