use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixtape_duel::{api, config::GameConfig, enrichment::TriviaConfig, state::AppState, ws};

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
                .unwrap_or_else(|_| "mixtape_duel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mixtape Duel...");

    let config = GameConfig::from_env();
    tracing::info!(
        "First to {} points wins, {:?} between rounds",
        config.score_limit,
        config.advance_delay
    );

    let mut state = AppState::new(config);

    // Genre and similar-artist questions need a trivia source
    match TriviaConfig::from_env().build_source() {
        Ok(source) => {
            tracing::info!("Trivia enrichment enabled");
            state = state.with_trivia(Arc::new(source));
        }
        Err(e) => {
            tracing::warn!(
                "Trivia enrichment unavailable: {}. Genre and similar-artist questions are disabled.",
                e
            );
        }
    }

    let state = Arc::new(state);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/state/export", get(api::export_state))
        .route("/api/state/import", post(api::import_state))
        .route("/api/history", get(api::list_history))
        .route("/api/stats/{team}", get(api::team_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("MIXTAPE_PORT")
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(6574);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
