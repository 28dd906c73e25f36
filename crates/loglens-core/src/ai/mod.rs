//! AI follow-up for insight results
//!
//! The engine never runs inference itself. It assembles an [`AiRequest`] and
//! hands it to an [`AiDispatcher`], the external collaborator that returns
//! narrative text or an error.
//!
//! # Architecture
//!
//! - `AiDispatcher` trait: the dispatch capability
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Dispatchers: `OllamaDispatcher`, `MockDispatcher`
//! - `AiTrigger`: decides when to dispatch and attaches the narrative
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Dispatcher to use (ollama, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2)

mod mock;
mod ollama;
pub mod trigger;
pub mod types;

pub use mock::MockDispatcher;
pub use ollama::OllamaDispatcher;
pub use trigger::{attach, should_auto_trigger, AiTrigger, TriggerOutcome};
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// The AI-dispatch collaborator
///
/// Receives an assembled request and returns the narrative text.
#[async_trait]
pub trait AiDispatcher: Send + Sync {
    async fn dispatch(&self, request: &AiRequest) -> Result<String>;

    /// Check if the dispatcher is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaDispatcher),
    /// Canned responses for tests and offline runs
    Mock(MockDispatcher),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which dispatcher to use:
    /// - `ollama` (default): Uses OLLAMA_HOST and OLLAMA_MODEL
    /// - `mock`: Creates a mock dispatcher
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaDispatcher::from_env().map(AIClient::Ollama),
            "mock" => Some(AIClient::Mock(MockDispatcher::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaDispatcher::from_env().map(AIClient::Ollama)
            }
        }
    }

    /// Create an Ollama dispatcher directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaDispatcher::new(host, model))
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockDispatcher::new())
    }
}

#[async_trait]
impl AiDispatcher for AIClient {
    async fn dispatch(&self, request: &AiRequest) -> Result<String> {
        match self {
            AIClient::Ollama(d) => d.dispatch(request).await,
            AIClient::Mock(d) => d.dispatch(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(d) => d.health_check().await,
            AIClient::Mock(d) => d.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(d) => d.model(),
            AIClient::Mock(d) => d.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(d) => d.host(),
            AIClient::Mock(d) => d.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_dispatch() {
        let client = AIClient::mock();
        assert!(client.health_check().await);

        let request = AiRequest {
            prompt: "Explain:\nTotal Matches: 1".into(),
            prompt_type: PromptType::Explain,
            insight_id: Some("demo".into()),
            metadata: Default::default(),
        };
        let narrative = client.dispatch(&request).await.unwrap();
        assert!(!narrative.is_empty());
    }
}
