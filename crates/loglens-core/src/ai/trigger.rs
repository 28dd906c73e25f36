//! AI Trigger Orchestrator
//!
//! Decides whether a finished [`InsightResult`] gets an AI follow-up, builds
//! the request, hands it to an [`AiDispatcher`] and attaches the narrative.
//!
//! - Automatic: `enabled && auto && result.has_signal()`
//! - Manual: whenever `enabled`
//! - At most one request in flight per result; extra attempts are no-ops
//! - The narrative slot is written once; dispatch failures land there as an
//!   error marker

use std::sync::Mutex;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::insights::InsightResult;
use crate::prompts::{render_template, PromptId, PromptLibrary};

use super::types::{AIConfig, AiNarrative, AiRequest};
use super::AiDispatcher;

/// What a dispatch attempt did to the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The trigger condition did not hold
    NotTriggered,
    /// A narrative was attached
    Attached,
    /// The dispatcher failed; an error marker was attached
    DispatchFailed(String),
    /// Another request for this result is still pending
    Suppressed,
    /// The result already carries a narrative
    AlreadyAttached,
}

/// Whether the automatic trigger fires for this result
pub fn should_auto_trigger(config: &AIConfig, result: &InsightResult) -> bool {
    config.enabled && config.auto && result.has_signal()
}

/// Fill the result's narrative slot; false if it was already filled
pub fn attach(narrative: AiNarrative, to: &InsightResult) -> bool {
    to.set_narrative(narrative)
}

/// Releases the in-flight slot even if the dispatch future is dropped
struct InFlight<'a>(&'a InsightResult);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.end_ai_request();
    }
}

pub struct AiTrigger {
    prompts: Mutex<PromptLibrary>,
}

impl AiTrigger {
    /// Trigger using the default prompt library (overrides + embedded)
    pub fn new() -> Self {
        Self::with_prompts(PromptLibrary::new())
    }

    pub fn with_prompts(prompts: PromptLibrary) -> Self {
        Self {
            prompts: Mutex::new(prompts),
        }
    }

    /// Request for the automatic trigger, or None when it does not fire
    pub fn maybe_trigger(
        &self,
        result: &InsightResult,
        config: &AIConfig,
        insight_id: Option<&str>,
    ) -> Result<Option<AiRequest>> {
        if !should_auto_trigger(config, result) {
            debug!(
                insight = insight_id.unwrap_or("-"),
                enabled = config.enabled,
                auto = config.auto,
                signal = result.has_signal(),
                "AI auto-trigger not fired"
            );
            return Ok(None);
        }
        self.build_request(result, config, insight_id).map(Some)
    }

    /// Request for a user-initiated follow-up, available whenever AI is enabled
    pub fn manual_request(
        &self,
        result: &InsightResult,
        config: &AIConfig,
        insight_id: Option<&str>,
    ) -> Result<Option<AiRequest>> {
        if !config.enabled {
            return Ok(None);
        }
        self.build_request(result, config, insight_id).map(Some)
    }

    fn build_request(
        &self,
        result: &InsightResult,
        config: &AIConfig,
        insight_id: Option<&str>,
    ) -> Result<AiRequest> {
        config.validate().map_err(Error::InvalidData)?;

        let prompt = match PromptId::for_prompt_type(config.prompt_type) {
            Some(id) => {
                let mut prompts = self.prompts.lock().map_err(|_| {
                    Error::InvalidData("Failed to acquire prompt library lock".into())
                })?;
                prompts.get(id)?.render(&result.content)
            }
            None => {
                // validate() guarantees the template for custom prompts
                let template = config.custom_prompt.as_deref().unwrap_or_default();
                render_template(template, &result.content)
            }
        };

        let mut metadata = result.metadata.clone().unwrap_or_default();
        metadata.insert("result_type".into(), json!(result.result_type.as_str()));
        if let Some(count) = result.match_count {
            metadata.insert("match_count".into(), json!(count));
        }

        Ok(AiRequest {
            prompt,
            prompt_type: config.prompt_type,
            insight_id: insight_id.map(str::to_string),
            metadata,
        })
    }

    /// Send `request` and attach the outcome to `result`
    pub async fn dispatch(
        &self,
        dispatcher: &dyn AiDispatcher,
        result: &InsightResult,
        request: AiRequest,
    ) -> TriggerOutcome {
        if result.narrative().is_some() {
            return TriggerOutcome::AlreadyAttached;
        }
        if !result.begin_ai_request() {
            debug!(
                insight = request.insight_id.as_deref().unwrap_or("-"),
                "AI request already in flight, suppressing"
            );
            return TriggerOutcome::Suppressed;
        }
        let _slot = InFlight(result);

        info!(
            insight = request.insight_id.as_deref().unwrap_or("-"),
            prompt_type = %request.prompt_type,
            model = dispatcher.model(),
            "Dispatching AI request"
        );

        let (narrative, outcome) = match dispatcher.dispatch(&request).await {
            Ok(text) => (AiNarrative::Text(text), TriggerOutcome::Attached),
            Err(e) => {
                warn!(
                    insight = request.insight_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "AI dispatch failed"
                );
                let message = e.to_string();
                (
                    AiNarrative::Error(message.clone()),
                    TriggerOutcome::DispatchFailed(message),
                )
            }
        };

        if attach(narrative, result) {
            outcome
        } else {
            TriggerOutcome::AlreadyAttached
        }
    }

    /// Automatic trigger end to end: decide, build, dispatch, attach
    pub async fn run_auto(
        &self,
        dispatcher: &dyn AiDispatcher,
        result: &InsightResult,
        config: &AIConfig,
        insight_id: Option<&str>,
    ) -> Result<TriggerOutcome> {
        match self.maybe_trigger(result, config, insight_id)? {
            Some(request) => Ok(self.dispatch(dispatcher, result, request).await),
            None => Ok(TriggerOutcome::NotTriggered),
        }
    }
}

impl Default for AiTrigger {
    fn default() -> Self {
        Self::new()
    }
}
