//! Turn-taking loop
//!
//! A conversation is a seed turn followed by up to five generated turns,
//! alternating between the two personas. Each turn is pushed into a bounded
//! channel as soon as it exists; the channel closes when the loop ends for
//! any reason.

use super::responder::{Responder, SILENT_PLACEHOLDER};
use super::turn::{Agent, Turn};
use serde::Deserialize;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Seed plus generated turns
pub const MAX_TURNS: usize = 6;

/// Pacing used when none is configured
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

const TURN_BUFFER: usize = 8;

/// Who speaks, and about what
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub agent1_persona: String,
    pub agent2_persona: String,
    pub theme: String,
}

impl ConversationRequest {
    pub fn new(
        agent1_persona: impl Into<String>,
        agent2_persona: impl Into<String>,
        theme: impl Into<String>,
    ) -> Self {
        Self {
            agent1_persona: agent1_persona.into(),
            agent2_persona: agent2_persona.into(),
            theme: theme.into(),
        }
    }

    fn validate(&self) -> Result<(), StartError> {
        for (field, value) in [
            ("agent1Persona", &self.agent1_persona),
            ("agent2Persona", &self.agent2_persona),
            ("theme", &self.theme),
        ] {
            if value.trim().is_empty() {
                return Err(StartError::EmptyField(field));
            }
        }
        Ok(())
    }

    fn persona_for(&self, agent: Agent) -> &str {
        match agent {
            Agent::First => &self.agent1_persona,
            Agent::Second | Agent::System => &self.agent2_persona,
        }
    }
}

/// Failures that prevent a conversation from starting. No stream exists
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// A started conversation
#[derive(Debug)]
pub struct ConversationStart {
    /// The seed turn, also sent as the first record of `turns`
    pub initial_message: Turn,
    pub turns: ReceiverStream<Turn>,
}

/// The synthetic first message, never sent to the model
pub fn seed_message(theme: &str) -> String {
    format!("Hello! I'm ready to start our conversation about {theme}")
}

/// Start a conversation on a background task.
///
/// Returns once the seed exists; generated turns arrive on
/// [`ConversationStart::turns`] with `pacing` between them.
pub fn start_conversation(
    responder: Arc<dyn Responder>,
    request: ConversationRequest,
    pacing: Duration,
) -> Result<ConversationStart, StartError> {
    request.validate()?;

    let seed = Turn::new(0, Agent::First, seed_message(&request.theme));
    let (tx, rx) = mpsc::channel(TURN_BUFFER);
    let sink = TurnSink::new(tx);

    tracing::info!(theme = %request.theme, "Conversation started");
    tokio::spawn(supervise(responder, request, pacing, sink, seed.clone()));

    Ok(ConversationStart {
        initial_message: seed,
        turns: ReceiverStream::new(rx),
    })
}

/// The consumer dropped its end of the stream
#[derive(Debug, Error)]
#[error("turn stream closed by consumer")]
struct StreamClosed;

/// Sending half of the turn stream; numbers records as they go out
#[derive(Clone)]
struct TurnSink {
    tx: mpsc::Sender<Turn>,
    next_seq: Arc<AtomicU64>,
}

impl TurnSink {
    fn new(tx: mpsc::Sender<Turn>) -> Self {
        Self {
            tx,
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Push a turn that already carries its sequence number
    async fn push(&self, turn: Turn) -> Result<(), StreamClosed> {
        self.tx.send(turn).await.map_err(|_| StreamClosed)
    }

    async fn emit(&self, agent: Agent, message: String) -> Result<(), StreamClosed> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.push(Turn::new(seq, agent, message)).await
    }
}

/// Loop-local conversation state
struct ConversationState {
    previous_messages: Vec<String>,
    current_agent: Agent,
    turn_count: usize,
}

impl ConversationState {
    fn after_seed(seed: String) -> Self {
        Self {
            previous_messages: vec![seed],
            current_agent: Agent::Second,
            turn_count: 1,
        }
    }

    fn record(&mut self, message: String) {
        self.previous_messages.push(message);
        self.current_agent = self.current_agent.other();
        self.turn_count += 1;
    }
}

/// Runs the turn loop and reports a crash of it as a system turn. The
/// channel closes when both tasks have dropped their sinks.
async fn supervise(
    responder: Arc<dyn Responder>,
    request: ConversationRequest,
    pacing: Duration,
    sink: TurnSink,
    seed: Turn,
) {
    let run = tokio::spawn(run_turns(responder, request, pacing, sink.clone(), seed));

    if let Err(e) = run.await {
        let details = if e.is_panic() {
            panic_message(e.into_panic())
        } else {
            e.to_string()
        };
        tracing::error!(error = %details, "Error in conversation stream");
        let _ = sink
            .emit(Agent::System, format!("[Stream error: {details}]"))
            .await;
    }

    tracing::debug!("Stream closing");
}

async fn run_turns(
    responder: Arc<dyn Responder>,
    request: ConversationRequest,
    pacing: Duration,
    sink: TurnSink,
    seed: Turn,
) {
    let mut state = ConversationState::after_seed(seed.message.clone());
    if sink.push(seed).await.is_err() {
        tracing::debug!("Consumer gone before the seed was delivered");
        return;
    }

    while state.turn_count < MAX_TURNS {
        let agent = state.current_agent;
        tracing::info!(turn = state.turn_count, agent = agent.id(), "Agent responding");

        let persona = request.persona_for(agent);
        let response = match responder
            .respond(persona, &request.theme, &state.previous_messages)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(turn = state.turn_count, error = %e, "Error generating turn");
                let _ = sink
                    .emit(agent, format!("[Error generating response: {e}]"))
                    .await;
                return;
            }
        };

        // Silence ends the conversation rather than being retried.
        if response.trim().is_empty() {
            tracing::warn!(turn = state.turn_count, "Received empty response, ending conversation");
            let _ = sink.emit(agent, SILENT_PLACEHOLDER.to_string()).await;
            return;
        }

        if sink.emit(agent, response.clone()).await.is_err() {
            tracing::debug!(turn = state.turn_count, "Consumer dropped the stream, stopping");
            return;
        }

        state.record(response);

        if state.turn_count < MAX_TURNS {
            tokio::time::sleep(pacing).await;
        }
    }

    tracing::info!(turns = state.turn_count, "Conversation complete");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "turn loop panicked".to_string()
    }
}
