//! Turn records and their wire encoding

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Speaker of a turn, encoded on the wire as `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Agent {
    /// Stream-level notices that no persona produced
    System,
    First,
    Second,
}

impl Agent {
    pub fn id(self) -> u8 {
        match self {
            Agent::System => 0,
            Agent::First => 1,
            Agent::Second => 2,
        }
    }

    /// The persona that speaks after this one. `System` has no partner.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Agent::First => Agent::Second,
            Agent::Second => Agent::First,
            Agent::System => Agent::System,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agent::System => f.write_str("system"),
            other => write!(f, "agent {}", other.id()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown agent id {0}")]
pub struct UnknownAgent(pub u8);

impl From<Agent> for u8 {
    fn from(agent: Agent) -> Self {
        agent.id()
    }
}

impl TryFrom<u8> for Agent {
    type Error = UnknownAgent;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(Agent::System),
            1 => Ok(Agent::First),
            2 => Ok(Agent::Second),
            other => Err(UnknownAgent(other)),
        }
    }
}

/// One emitted unit of conversation.
///
/// `seq` is assigned by the producer, starts at 0 for the seed turn and
/// increases by one per record, so consumers can drop duplicates by
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub seq: u64,
    pub agent: Agent,
    pub message: String,
}

impl Turn {
    pub fn new(seq: u64, agent: Agent, message: impl Into<String>) -> Self {
        Self {
            seq,
            agent,
            message: message.into(),
        }
    }

    /// Serialize as one UTF-8 JSON object with no trailing delimiter.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
