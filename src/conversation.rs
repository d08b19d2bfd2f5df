//! Two-persona conversations
//!
//! The orchestrator drives the turn loop, the responder turns a persona and
//! history into the next message, and the decoder reassembles the resulting
//! record stream on the consuming side.

mod decoder;
mod orchestrator;
mod prompt;
mod responder;
mod turn;

#[cfg(test)]
pub mod testing;

pub use decoder::{DecodeError, Transcript, TurnDecoder};
pub use orchestrator::{
    seed_message, start_conversation, ConversationRequest, ConversationStart, StartError,
    DEFAULT_PACING, MAX_TURNS,
};
pub use prompt::build_prompt;
pub use responder::{LlmResponder, Responder, NO_CANDIDATE_PLACEHOLDER, SILENT_PLACEHOLDER};
pub use turn::{Agent, Turn, UnknownAgent};
