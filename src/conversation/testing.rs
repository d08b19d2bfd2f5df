//! Mock responder for tests
//!
//! Replays queued outcomes in order and records every call.

use super::responder::Responder;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Scripted {
    Reply(Result<String, LlmError>),
    Panic(&'static str),
}

/// Arguments of one `respond` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub persona: String,
    pub theme: String,
    pub previous: Vec<String>,
}

#[derive(Default)]
pub struct MockResponder {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_text(&self, text: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(Ok(text.into())));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(Err(error)));
    }

    /// The matching call panics with `message`
    pub fn queue_panic(&self, message: &'static str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Panic(message));
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn respond(
        &self,
        persona: &str,
        theme: &str,
        previous: &[String],
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            persona: persona.to_string(),
            theme: theme.to_string(),
            previous: previous.to_vec(),
        });

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(result)) => result,
            Some(Scripted::Panic(message)) => std::panic::panic_any(message),
            None => Err(LlmError::network("No mock response queued")),
        }
    }
}
