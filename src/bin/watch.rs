//! duet-watch: start a conversation and print its turns as they arrive
//!
//! Ctrl-C stops reading; the server notices the next time it tries to send.

use clap::Parser;
use futures::StreamExt;
use persona_duet::conversation::{Agent, Transcript, Turn, TurnDecoder};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "duet-watch", about = "Watch two personas talk about a theme")]
struct Args {
    /// Base URL of a running persona-duet server
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Persona for agent 1
    #[arg(long)]
    agent1: String,

    /// Persona for agent 2
    #[arg(long)]
    agent2: String,

    /// What they talk about
    #[arg(long)]
    theme: String,
}

fn print_turn(turn: &Turn, args: &Args) {
    let speaker = match turn.agent {
        Agent::First => args.agent1.as_str(),
        Agent::Second => args.agent2.as_str(),
        Agent::System => "system",
    };
    println!("[{speaker}] {}", turn.message);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let url = format!("{}/api/conversations", args.server.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({
            "agent1Persona": &args.agent1,
            "agent2Persona": &args.agent2,
            "theme": &args.theme,
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("server returned {status}: {body}").into());
    }

    let mut chunks = response.bytes_stream();
    let mut decoder = TurnDecoder::new();
    let mut transcript = Transcript::new();

    loop {
        tokio::select! {
            chunk = chunks.next() => {
                let Some(chunk) = chunk else { break };
                for turn in decoder.feed(&chunk?) {
                    if let Some(turn) = transcript.accept(turn) {
                        print_turn(turn, &args);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopped by user");
                break;
            }
        }
    }

    if decoder.pending() > 0 {
        tracing::warn!(bytes = decoder.pending(), "Stream ended inside a record");
    }
    tracing::debug!(turns = transcript.turns().len(), "Conversation ended");

    Ok(())
}
