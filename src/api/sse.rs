//! Server-Sent Events support

use crate::conversation::Turn;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// One `turn` event per record, then a closing `done` event
pub fn sse_stream(
    turns: ReceiverStream<Turn>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = turns.map(|turn| Ok(turn_to_event(&turn)));
    let done = futures::stream::once(async { Ok(Event::default().event("done").data("{}")) });

    Sse::new(events.chain(done)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn turn_to_event(turn: &Turn) -> Event {
    let data = json!({
        "seq": turn.seq,
        "agent": turn.agent.id(),
        "message": turn.message
    });

    Event::default()
        .event("turn")
        .id(turn.seq.to_string())
        .data(data.to_string())
}
