//! Mock dispatcher for testing
//!
//! Returns predictable narratives without a running LLM server. Can be
//! configured to fail or to hold each request for a while, and records what
//! it was asked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::AiRequest;
use super::AiDispatcher;

#[derive(Debug, Clone)]
enum Reply {
    /// Summarize the request
    Echo,
    Text(String),
    Fail(String),
}

/// Mock AI dispatcher
#[derive(Debug, Clone)]
pub struct MockDispatcher {
    reply: Reply,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<AiRequest>>>,
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self {
            reply: Reply::Echo,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            healthy: true,
        }
    }

    /// Always answer with `text`
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.reply = Reply::Text(text.into());
        self
    }

    /// Always fail with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.reply = Reply::Fail(message.into());
        self.healthy = false;
        self
    }

    /// Hold every request for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of dispatches so far (shared across clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far (shared across clones)
    pub fn requests(&self) -> Vec<AiRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for MockDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiDispatcher for MockDispatcher {
    async fn dispatch(&self, request: &AiRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Reply::Echo => Ok(format!(
                "Mock {} narrative for {} ({} prompt characters)",
                request.prompt_type,
                request.insight_id.as_deref().unwrap_or("unknown insight"),
                request.prompt.chars().count()
            )),
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(Error::AiDispatch(message.clone())),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::PromptType;

    fn request() -> AiRequest {
        AiRequest {
            prompt: "abc".into(),
            prompt_type: PromptType::Recommend,
            insight_id: Some("crashes".into()),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_echo_reply() {
        let mock = MockDispatcher::new();
        let text = mock.dispatch(&request()).await.unwrap();
        assert_eq!(text, "Mock recommend narrative for crashes (3 prompt characters)");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.requests()[0].prompt, "abc");
    }

    #[tokio::test]
    async fn test_failing_reply() {
        let mock = MockDispatcher::new().failing("model offline");
        let err = mock.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, Error::AiDispatch(ref m) if m == "model offline"));
        assert!(!mock.health_check().await);
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let mock = MockDispatcher::new().with_response("fixed");
        let clone = mock.clone();
        assert_eq!(clone.dispatch(&request()).await.unwrap(), "fixed");
        assert_eq!(mock.call_count(), 1);
    }
}
