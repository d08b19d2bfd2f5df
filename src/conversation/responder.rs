//! Per-turn response generation

use super::prompt::build_prompt;
use crate::llm::{LlmError, LlmRequest, LlmService};
use async_trait::async_trait;
use std::sync::Arc;

pub const SILENT_PLACEHOLDER: &str = "(The model is silent for now, try again later.)";
pub const NO_CANDIDATE_PLACEHOLDER: &str = "Unable to generate a response from the API";

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 500;

/// Produces the next message for a persona
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate one reply given the persona, the theme, and every prior
    /// message in order.
    async fn respond(
        &self,
        persona: &str,
        theme: &str,
        previous: &[String],
    ) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: Responder + ?Sized> Responder for Arc<T> {
    async fn respond(
        &self,
        persona: &str,
        theme: &str,
        previous: &[String],
    ) -> Result<String, LlmError> {
        (**self).respond(persona, theme, previous).await
    }
}

/// Responder backed by an LLM service.
///
/// Never returns `Err`: upstream failures come back as `"Error: ..."` text
/// and missing or empty output as a placeholder, so callers treat whatever
/// it returns as the turn's message.
pub struct LlmResponder {
    service: Arc<dyn LlmService>,
}

impl LlmResponder {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(
        &self,
        persona: &str,
        theme: &str,
        previous: &[String],
    ) -> Result<String, LlmError> {
        tracing::debug!(
            model = %self.service.model_id(),
            theme,
            previous_messages = previous.len(),
            "Generating response"
        );

        let request = LlmRequest::prompt(build_prompt(persona, theme, previous))
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_OUTPUT_TOKENS);

        match self.service.complete(&request).await {
            Ok(response) => {
                let text = match response.text {
                    Some(text) => text,
                    None => {
                        tracing::warn!("Response envelope carried no candidate text");
                        NO_CANDIDATE_PLACEHOLDER.to_string()
                    }
                };
                if text.trim().is_empty() {
                    tracing::warn!("Received empty response from the model");
                    return Ok(SILENT_PLACEHOLDER.to_string());
                }
                Ok(text)
            }
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}
