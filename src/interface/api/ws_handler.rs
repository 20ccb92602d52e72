//! Agent WebSocket channel
//!
//! Each connection is one agent client. Connect registers presence and
//! announces it; disconnect removes presence unconditionally. Outbound
//! events come from the process-wide broadcaster; an envelope's `exclude`
//! marker suppresses echo of an agent's own status update.

use super::AppState;
use crate::domain::presence::AgentStatus;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message sent by the agent client over the channel
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientMessage {
    UpdateStatus { status: AgentStatus },
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before announcing so this client observes its own connect
    let mut rx = state.broadcaster.subscribe();
    state.orchestrator.agent_connected(connection_id).await;

    let welcome = serde_json::json!({
        "type": "welcome",
        "connectionId": connection_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg)).await.is_err() {
            warn!("Agent {} dropped before welcome", connection_id);
            state.orchestrator.agent_disconnected(connection_id).await;
            return;
        }
    }

    let mut send_task = tokio::spawn(async move {
        while let Ok(envelope) = rx.recv().await {
            if envelope.exclude == Some(connection_id) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&envelope.event) {
                if sender.send(Message::Text(json)).await.is_err() {
                    debug!("Agent {} send failed, closing", connection_id);
                    break;
                }
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => {
                    info!("Agent {} requested close", connection_id);
                    break;
                }
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::UpdateStatus { status }) => {
                        debug!("Agent {} status update: {}", connection_id, status.as_str());
                        recv_state
                            .orchestrator
                            .agent_status_updated(connection_id, status)
                            .await;
                    }
                    Err(e) => debug!("Unparseable message from {}: {}", connection_id, e),
                },
                Message::Ping(_) | Message::Pong(_) => {}
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.orchestrator.agent_disconnected(connection_id).await;
}
