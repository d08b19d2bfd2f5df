//! persona-duet: two LLM personas talking about a theme
//!
//! A turn-taking loop alternates between two personas, asks Gemini for each
//! reply, and streams every turn to the client as soon as it exists.

pub mod api;
pub mod config;
pub mod conversation;
pub mod llm;
