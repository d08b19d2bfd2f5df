//! persona-duet server
//!
//! Serves the conversation API on `DUET_PORT`.

use persona_duet::api::{create_router, AppState};
use persona_duet::config::DuetConfig;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_duet=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = DuetConfig::from_env()?;

    let state = AppState::from_config(&config)?;
    if state.has_responder() {
        tracing::info!(
            model = %config.gemini_model,
            api_key = %config.masked_api_key().unwrap_or_default(),
            timeout_secs = config.request_timeout.as_secs(),
            "Gemini client initialized"
        );
    } else {
        tracing::warn!("GOOGLE_API_KEY is not set; conversations will fail to start");
    }

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("persona-duet server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
