//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ErrorResponse, HealthResponse};
use super::AppState;
use crate::conversation::{start_conversation, ConversationRequest, ConversationStart, StartError};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_stream::StreamExt;

/// Content type of the raw record stream. The body is JSON objects back to
/// back with no delimiter, which is not itself a JSON document.
pub const TURN_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Raw record stream
        .route("/api/conversations", post(stream_conversation))
        // Same conversation as SSE, for EventSource clients
        .route("/api/conversations/events", get(conversation_events))
        .route("/api/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Conversations
// ============================================================

fn begin(state: &AppState, request: ConversationRequest) -> Result<ConversationStart, AppError> {
    let responder = state.responder()?;
    let start = start_conversation(responder, request, state.pacing)?;
    Ok(start)
}

/// Stream turns as back-to-back JSON objects, seed first.
async fn stream_conversation(
    State(state): State<AppState>,
    Json(request): Json<ConversationRequest>,
) -> Result<Response, AppError> {
    let start = begin(&state, request)?;
    tracing::debug!(initial = %start.initial_message.message, "Streaming conversation");

    let body = Body::from_stream(start.turns.map(|turn| turn.encode()));

    Ok((
        [
            (header::CONTENT_TYPE, TURN_STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

async fn conversation_events(
    State(state): State<AppState>,
    Query(request): Query<ConversationRequest>,
) -> Result<Response, AppError> {
    let start = begin(&state, request)?;
    Ok(sse_stream(start.turns).into_response())
}

// ============================================================
// Health & Version
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Server is running",
    })
}

async fn get_version() -> &'static str {
    concat!("persona-duet ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl From<StartError> for AppError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::MissingApiKey => {
                tracing::error!("GOOGLE_API_KEY is not set");
                AppError::Internal(err.to_string())
            }
            StartError::EmptyField(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
