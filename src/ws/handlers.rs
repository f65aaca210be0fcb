//! WebSocket message dispatch
//!
//! Host commands drive the game; displays may only read state.
//! Game events reach every client through the broadcast channel, so the
//! direct reply is reserved for errors and queries.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::SessionUpdate;
use crate::state::{AppState, HostError};
use crate::types::Role;
use std::sync::Arc;

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($role:expr, $action:expr) => {
        if *$role != Role::Host {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only host can {}", $action),
            });
        }
    };
}

/// Errors become the reply; successful updates were already broadcast
fn reply(result: Result<SessionUpdate, HostError>) -> Option<ServerMessage> {
    match result {
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Rejected action: {}", e);
            Some(e.into())
        }
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    role: &Role,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::GetState => Some(ServerMessage::State {
            view: state.get_view().await,
        }),

        ClientMessage::GetTeamStats { team_name } => Some(ServerMessage::TeamStats {
            stats: state.team_stats(&team_name).await,
        }),

        ClientMessage::ValidatePlaylist { tracks } => {
            let verdict = state.validate_playlist(&tracks);
            Some(ServerMessage::PlaylistValidation {
                valid: verdict.is_valid,
                warnings: verdict.warnings,
            })
        }

        ClientMessage::SetupGame {
            playlist,
            teams,
            dominant_artists,
            score_limit,
            shuffle,
        } => {
            check_host!(role, "set up a game");
            tracing::info!("Host setting up game with '{}'", playlist.name);
            match state
                .setup_game(playlist, teams, dominant_artists, score_limit, shuffle)
                .await
            {
                Ok(_) => None,
                Err(HostError::InvalidPlaylist(warnings)) => Some(ServerMessage::PlaylistValidation {
                    valid: false,
                    warnings,
                }),
                Err(e) => Some(e.into()),
            }
        }

        ClientMessage::SetSelectionMode { mode } => {
            check_host!(role, "change the selection mode");
            state.set_selection_mode(mode).await.err().map(Into::into)
        }

        ClientMessage::NextQuestion => {
            check_host!(role, "advance to the next question");
            match state.start_round().await {
                Ok(Some(pending)) => {
                    // Enrichment lookups can be slow; keep this socket serving meanwhile
                    let state = state.clone();
                    tokio::spawn(async move {
                        let round = pending.round();
                        if let Err(e) = state.generate_round(pending).await {
                            tracing::warn!("Round {} has no question: {}", round, e);
                            state.broadcast(e.into());
                        }
                    });
                    None
                }
                Ok(None) => None,
                Err(e) => Some(e.into()),
            }
        }

        ClientMessage::RecordAnswer { team_id, answer } => {
            check_host!(role, "record answers");
            reply(state.record_answer(&team_id, &answer).await)
        }

        ClientMessage::RecordBuzz { team_id } => {
            check_host!(role, "record buzzes");
            reply(state.record_buzz(&team_id).await)
        }

        ClientMessage::ClearBuzz => {
            check_host!(role, "clear the buzzer");
            reply(state.clear_buzz().await)
        }

        ClientMessage::JudgeBuzz { correct } => {
            check_host!(role, "judge answers");
            reply(state.judge_buzz(correct).await)
        }

        ClientMessage::SkipRound => {
            check_host!(role, "skip rounds");
            reply(state.skip_round().await)
        }

        ClientMessage::Rematch => {
            check_host!(role, "start a rematch");
            state.rematch().await.err().map(Into::into)
        }

        ClientMessage::ResetGame => {
            check_host!(role, "reset the game");
            state.reset_game().await;
            None
        }
    }
}
