//! AI trigger types
//!
//! These types are dispatcher-agnostic and shared by every AI collaborator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the result content in custom prompts
pub const RESULT_PLACEHOLDER: &str = "{result_content}";

/// Which prompt template an insight uses for its AI follow-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    /// Built-in: explain what the results mean
    #[default]
    Explain,
    /// Built-in: recommend actions based on the results
    Recommend,
    /// Author-provided template
    Custom,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Explain => "explain",
            PromptType::Recommend => "recommend",
            PromptType::Custom => "custom",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explain" => Ok(PromptType::Explain),
            "recommend" => Ok(PromptType::Recommend),
            "custom" => Ok(PromptType::Custom),
            _ => Err(format!("Unknown prompt type: {}", s)),
        }
    }
}

/// Per-insight AI follow-up configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AIConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Trigger automatically when the result carries a signal
    #[serde(default)]
    pub auto: bool,
    #[serde(default, alias = "promptType")]
    pub prompt_type: PromptType,
    /// Custom template; required when `prompt_type` is custom
    #[serde(default, rename = "prompt")]
    pub custom_prompt: Option<String>,
}

impl AIConfig {
    /// AI enabled with automatic triggering and a built-in prompt
    pub fn auto(prompt_type: PromptType) -> Self {
        Self {
            enabled: true,
            auto: true,
            prompt_type,
            custom_prompt: None,
        }
    }

    /// AI enabled and auto-triggered with a custom template
    pub fn custom(template: impl Into<String>) -> Self {
        Self {
            enabled: true,
            auto: true,
            prompt_type: PromptType::Custom,
            custom_prompt: Some(template.into()),
        }
    }

    /// Check the custom template contract
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt_type != PromptType::Custom {
            return Ok(());
        }
        let template = self
            .custom_prompt
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "ai.prompt is required when prompt_type is custom".to_string())?;
        match template.matches(RESULT_PLACEHOLDER).count() {
            1 => Ok(()),
            n => Err(format!(
                "custom prompt must contain exactly one {} placeholder (found {})",
                RESULT_PLACEHOLDER, n
            )),
        }
    }
}

/// An assembled request for the AI-dispatch collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiRequest {
    pub prompt: String,
    pub prompt_type: PromptType,
    /// Insight that produced the result, when known
    pub insight_id: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// What ended up in a result's narrative slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum AiNarrative {
    Text(String),
    /// The dispatch failed; kept as a marker instead of being dropped
    Error(String),
}

impl AiNarrative {
    pub fn is_error(&self) -> bool {
        matches!(self, AiNarrative::Error(_))
    }

    pub fn as_text(&self) -> &str {
        match self {
            AiNarrative::Text(t) | AiNarrative::Error(t) => t,
        }
    }
}
