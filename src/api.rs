//! HTTP API endpoints for state management.
//!
//! The host UI uses these to back up and restore a session during a party
//! and to show past results.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::session::export::SessionSnapshot;
use crate::session::{GameResult, TeamStats};
use crate::state::AppState;

/// Export the active session and history as JSON.
///
/// GET /api/state/export
pub async fn export_state(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.export_snapshot().await)
}

/// Import a snapshot of any supported schema version.
///
/// POST /api/state/import
///
/// The body is taken as raw JSON so older snapshots can be migrated
/// before they are deserialized.
pub async fn import_state(State(state): State<Arc<AppState>>, body: String) -> Response {
    let snapshot = match SessionSnapshot::from_json(&body) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!("Snapshot rejected: {}", e);
            return (StatusCode::BAD_REQUEST, format!("Import failed: {}", e)).into_response();
        }
    };

    match state.import_snapshot(snapshot).await {
        Ok(_) => (StatusCode::OK, "State imported successfully").into_response(),
        Err(e) => {
            tracing::error!("State import failed: {}", e);
            (StatusCode::BAD_REQUEST, format!("Import failed: {}", e)).into_response()
        }
    }
}

/// GET /api/history
pub async fn list_history(State(state): State<Arc<AppState>>) -> Json<Vec<GameResult>> {
    Json(state.history.read().await.results().to_vec())
}

/// GET /api/stats/{team}
pub async fn team_stats(
    State(state): State<Arc<AppState>>,
    Path(team): Path<String>,
) -> Json<TeamStats> {
    Json(state.team_stats(&team).await)
}
