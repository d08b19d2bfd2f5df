//! HTTP API
//!
//! Starts conversations and streams their turns, either as raw concatenated
//! JSON records or as Server-Sent Events.

mod handlers;
mod sse;
mod types;

pub use handlers::{create_router, TURN_STREAM_CONTENT_TYPE};
pub use types::*;

use crate::config::DuetConfig;
use crate::conversation::{LlmResponder, Responder, StartError};
use crate::llm::{GeminiService, LlmError, LlmService, LoggingService, TimeoutService};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    responder: Option<Arc<dyn Responder>>,
    pacing: Duration,
}

impl AppState {
    pub fn new(responder: Option<Arc<dyn Responder>>, pacing: Duration) -> Self {
        Self { responder, pacing }
    }

    /// Wire the Gemini client from configuration. Without a key the state
    /// has no responder and conversation starts fail.
    pub fn from_config(config: &DuetConfig) -> Result<Self, LlmError> {
        let responder = match &config.google_api_key {
            Some(key) => {
                let gemini: Arc<dyn LlmService> = Arc::new(GeminiService::new(
                    key.clone(),
                    &config.gemini_model,
                    &config.gemini_base_url,
                )?);
                let bounded: Arc<dyn LlmService> =
                    Arc::new(TimeoutService::new(gemini, config.request_timeout));
                let logged: Arc<dyn LlmService> = Arc::new(LoggingService::new(bounded));
                let responder: Arc<dyn Responder> = Arc::new(LlmResponder::new(logged));
                Some(responder)
            }
            None => None,
        };

        Ok(Self::new(responder, config.pacing))
    }

    pub fn has_responder(&self) -> bool {
        self.responder.is_some()
    }

    fn responder(&self) -> Result<Arc<dyn Responder>, StartError> {
        self.responder.clone().ok_or(StartError::MissingApiKey)
    }
}
