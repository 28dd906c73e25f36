//! Ollama dispatcher
//!
//! HTTP client for the Ollama `/api/generate` endpoint (non-streaming).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::AiRequest;
use super::AiDispatcher;

#[derive(Clone)]
pub struct OllamaDispatcher {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaDispatcher {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AiDispatcher for OllamaDispatcher {
    async fn dispatch(&self, request: &AiRequest) -> Result<String> {
        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::AiDispatch(format!(
                "Ollama returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(
            insight = request.insight_id.as_deref().unwrap_or("-"),
            chars = ollama_response.response.len(),
            "Ollama narrative received"
        );

        let narrative = ollama_response.response.trim();
        if narrative.is_empty() {
            return Err(Error::AiDispatch("Ollama returned an empty response".into()));
        }
        Ok(narrative.to_string())
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::PromptType;
    use crate::test_utils::MockOllamaServer;

    fn request(prompt: &str) -> AiRequest {
        AiRequest {
            prompt: prompt.into(),
            prompt_type: PromptType::Explain,
            insight_id: Some("android_crash".into()),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let dispatcher = OllamaDispatcher::new("http://localhost:11434/", "llama3.2");
        assert_eq!(dispatcher.host(), "http://localhost:11434");
        assert_eq!(dispatcher.model(), "llama3.2");
    }

    #[tokio::test]
    async fn test_dispatch_against_mock_server() {
        let server = MockOllamaServer::start().await;
        let dispatcher = OllamaDispatcher::new(&server.url(), "llama3.2");

        assert!(dispatcher.health_check().await);
        let narrative = dispatcher
            .dispatch(&request("Explain this:\nFATAL EXCEPTION: main"))
            .await
            .unwrap();
        assert!(narrative.contains("FATAL EXCEPTION"));
    }

    #[tokio::test]
    async fn test_server_error_is_dispatch_error() {
        let server = MockOllamaServer::start().await;
        let dispatcher = OllamaDispatcher::new(&server.url(), "llama3.2");

        let err = dispatcher
            .dispatch(&request(crate::test_utils::FAIL_PROMPT))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AiDispatch(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let dispatcher = OllamaDispatcher::new("http://127.0.0.1:9", "llama3.2");
        assert!(!dispatcher.health_check().await);
        assert!(dispatcher.dispatch(&request("x")).await.is_err());
    }
}
