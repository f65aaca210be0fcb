pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: role={:?}", params.role);

    let role = match params.role.as_deref() {
        Some("host") => Role::Host,
        _ => Role::Display,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, role, state))
}

type WsSender = SplitSink<WebSocket, Message>;

/// Serialize and send one message. False once the socket is gone.
async fn send_json(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize {:?}: {}", msg, e);
            true
        }
    }
}

/// Parse a text frame and dispatch it
async fn reply_to(text: &str, role: Role, state: &Arc<AppState>) -> Option<ServerMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => handlers::handle_message(msg, &role, state).await,
        Err(e) => {
            tracing::warn!("Unparseable message from {:?}: {}", role, e);
            Some(ServerMessage::error(
                "PARSE_ERROR",
                format!("Invalid message format: {}", e),
            ))
        }
    }
}

async fn handle_socket(socket: WebSocket, role: Role, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("{:?} connected", role);

    // Subscribe first so nothing between the welcome and the loop is missed
    let mut events = state.broadcast.subscribe();
    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        role,
        view: state.get_view().await,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_json(&mut sender, &welcome).await {
        tracing::warn!("{:?} left before the welcome", role);
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(msg) => {
                    if !send_json(&mut sender, &msg).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Resync with the full view rather than replaying
                    tracing::warn!("{:?} lagged, {} events skipped", role, skipped);
                    let view = state.get_view().await;
                    if !send_json(&mut sender, &ServerMessage::State { view }).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },

            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("{:?} sent: {}", role, text.as_str());
                    if let Some(reply) = reply_to(text.as_str(), role, &state).await {
                        if !send_json(&mut sender, &reply).await {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket error from {:?}: {}", role, e);
                    break;
                }
            },
        }
    }

    tracing::info!("{:?} disconnected", role);
}
