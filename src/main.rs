use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fichy::{api, llm, state::AppState, types::GameConfig, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fichy=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fichy...");

    // Initialize the question source
    let llm_config = llm::LlmConfig::from_env();
    let question_source = match llm_config.build_source() {
        Ok(source) => {
            tracing::info!("Question source initialized successfully");
            Some(source)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize question source: {}. Rounds will use the fallback question.",
                e
            );
            None
        }
    };

    let state = Arc::new(AppState::new_with_source(
        question_source,
        GameConfig::default(),
    ));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/", get(api::health))
        .route("/health", get(api::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
